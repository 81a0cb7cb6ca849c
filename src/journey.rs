use std::fmt::Display;

use crate::network::{Network, RouteIndex, StopIndex, Timestamp, TripIndex};
use crate::utils;

/// Where and when the trip that reached a stop was boarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Boarding {
    pub boarded_stop: StopIndex,
    pub boarded_stop_order: u32,
    pub boarded_time: Timestamp,
    pub route_idx: RouteIndex,
    pub trip_idx: TripIndex,
}

/// The labels of one search. `arrivals` is the best arrival by any means,
/// `trip_arrivals` the best arrival on board a trip, which walks start from.
#[derive(Clone, Copy)]
pub(crate) struct Labels<'l> {
    pub arrivals: &'l [Timestamp],
    pub parents: &'l [Option<Parent>],
    pub trip_arrivals: &'l [Timestamp],
    pub trip_parents: &'l [Option<Boarding>],
}

/// How the best known arrival at a stop was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parent {
    Trip(Boarding),
    Walk { from: StopIndex, departure_time: Timestamp },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leg {
    Trip {
        boarded_stop: StopIndex,
        boarded_stop_order: u32,
        boarded_time: Timestamp,
        arrival_stop: StopIndex,
        arrival_stop_order: u32,
        arrival_time: Timestamp,
        route_idx: RouteIndex,
        trip_idx: TripIndex,
    },
    Walk {
        from: StopIndex,
        to: StopIndex,
        departure_time: Timestamp,
        arrival_time: Timestamp,
    },
}

impl Leg {
    pub fn departure_time(&self) -> Timestamp {
        match *self {
            Leg::Trip { boarded_time, .. } => boarded_time,
            Leg::Walk { departure_time, .. } => departure_time,
        }
    }

    pub fn arrival_time(&self) -> Timestamp {
        match *self {
            Leg::Trip { arrival_time, .. } | Leg::Walk { arrival_time, .. } => arrival_time,
        }
    }

    pub fn from_stop(&self) -> StopIndex {
        match *self {
            Leg::Trip { boarded_stop, .. } => boarded_stop,
            Leg::Walk { from, .. } => from,
        }
    }

    pub fn to_stop(&self) -> StopIndex {
        match *self {
            Leg::Trip { arrival_stop, .. } => arrival_stop,
            Leg::Walk { to, .. } => to,
        }
    }

    pub fn is_trip(&self) -> bool { matches!(self, Leg::Trip { .. }) }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JourneyError {
    #[error("No journey found.")]
    NoJourneyFound,
    #[error("Infinite loop in journey reconstruction.")]
    InfiniteLoop,
}

pub type JourneyResult<'a> = Result<Journey<'a>, JourneyError>;

pub struct Journey<'a> {
    pub legs: Vec<Leg>,
    pub duration: Timestamp,
    pub network: &'a Network,
}

impl<'a> Journey<'a> {
    pub fn empty(network: &'a Network) -> Self {
        Self { legs: Vec::new(), duration: 0, network }
    }

    fn from(legs: Vec<Leg>, network: &'a Network) -> Self {
        let duration = match (legs.first(), legs.last()) {
            (Some(first), Some(last)) => last.arrival_time() - first.departure_time(),
            _ => 0,
        };
        Self { legs, duration, network }
    }

    pub fn departure_time(&self) -> Option<Timestamp> { self.legs.first().map(Leg::departure_time) }

    pub fn arrival_time(&self) -> Option<Timestamp> { self.legs.last().map(Leg::arrival_time) }

    pub fn num_trips(&self) -> usize { self.legs.iter().filter(|leg| leg.is_trip()).count() }

    fn calculate_arrival_stop_order(network: &Network, boarding: &Boarding, current_stop: StopIndex) -> u32 {
        network
            .route_stops(boarding.route_idx as usize)
            .iter()
            .enumerate()
            .skip(boarding.boarded_stop_order as usize + 1)
            .find_map(|(i, &stop)| (stop == current_stop).then_some(i as u32))
            .expect("Arrival stop not found in route.")
    }

    pub(crate) fn from_parents(labels: Labels<'_>, network: &'a Network, start: StopIndex, end: StopIndex) -> JourneyResult<'a> {
        if start == end {
            return Ok(Journey::empty(network));
        }
        // No journey found.
        if labels.parents[end as usize].is_none() {
            return Err(JourneyError::NoJourneyFound);
        }

        // Reconstruct the journey backwards from parent pointers. A walk always
        // starts where a trip alighted, so its origin is read from the trip labels.
        let mut legs = Vec::new();
        let mut current_stop = end;
        let mut after_walk = false;
        let max_legs = 2 * network.num_stops() + 1;
        while current_stop != start {
            if legs.len() > max_legs {
                return Err(JourneyError::InfiniteLoop);
            }
            let stop = current_stop as usize;
            let (arrival_time, parent) = if after_walk {
                (labels.trip_arrivals[stop], labels.trip_parents[stop].map(Parent::Trip))
            } else {
                (labels.arrivals[stop], labels.parents[stop])
            };
            match parent {
                Some(Parent::Trip(boarding)) => {
                    legs.push(Leg::Trip {
                        boarded_stop: boarding.boarded_stop,
                        boarded_stop_order: boarding.boarded_stop_order,
                        boarded_time: boarding.boarded_time,
                        arrival_stop: current_stop,
                        arrival_stop_order: Self::calculate_arrival_stop_order(network, &boarding, current_stop),
                        arrival_time,
                        route_idx: boarding.route_idx,
                        trip_idx: boarding.trip_idx,
                    });
                    current_stop = boarding.boarded_stop;
                    after_walk = false;
                }
                Some(Parent::Walk { from, departure_time }) => {
                    legs.push(Leg::Walk { from, to: current_stop, departure_time, arrival_time });
                    current_stop = from;
                    after_walk = true;
                }
                None => return Err(JourneyError::NoJourneyFound),
            }
        }

        legs.reverse();
        Ok(Journey::from(legs, network))
    }
}

impl Display for Journey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-----------------------------------------------")?;
        if !self.legs.is_empty() {
            for leg in self.legs.iter() {
                writeln!(f)?;
                match *leg {
                    Leg::Trip { boarded_stop, boarded_time, arrival_stop, arrival_time, route_idx, trip_idx, .. } => {
                        writeln!(
                            f,
                            "Board trip {} at {} at {}.",
                            self.network.trip_id(route_idx as usize, trip_idx as usize),
                            self.network.stop_name(boarded_stop),
                            utils::get_time_str(boarded_time),
                        )?;
                        writeln!(
                            f,
                            "Arrive at {} at {}.",
                            self.network.stop_name(arrival_stop),
                            utils::get_time_str(arrival_time)
                        )?;
                    }
                    Leg::Walk { from, to, departure_time, arrival_time } => {
                        writeln!(
                            f,
                            "Walk from {} at {} to {}, arriving at {}.",
                            self.network.stop_name(from),
                            utils::get_time_str(departure_time),
                            self.network.stop_name(to),
                            utils::get_time_str(arrival_time)
                        )?;
                    }
                }
            }
            writeln!(f)?;
            writeln!(f, "Total journey time: {} minutes.", self.duration / 60)?;
        } else {
            writeln!(f)?;
            writeln!(f, "No journey found.")?;
        }
        writeln!(f, "-----------------------------------------------")?;
        Ok(())
    }
}
