use std::collections::HashMap;

use log::info;

/// Seconds on a signed axis, so the reversed network can negate it exactly.
pub type Timestamp = i32;
pub type StopIndex = u32;
pub type StationIndex = u32;
pub type RouteIndex = u32;
pub type TripIndex = u32;
pub type HubIndex = u32;

/// Arrival time of anything that cannot be reached.
pub const INFINITY: Timestamp = Timestamp::MAX;

// Keeps negation and saturating additions away from the sentinels.
const TIME_LIMIT: Timestamp = Timestamp::MAX / 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("Route {route} has no stops or no trips.")]
    EmptyRoute { route: RouteIndex },
    #[error("Trip {trip} (route {route}) overtakes the previous trip at position {position}.")]
    FifoViolation { route: RouteIndex, trip: String, position: usize },
    #[error("Trip {trip} (route {route}) goes back in time at position {position}.")]
    DecreasingTimes { route: RouteIndex, trip: String, position: usize },
    #[error("Trip {trip} has time {time} outside the supported range.")]
    TimeOutOfRange { trip: String, time: Timestamp },
    #[error("Stop index {stop} is out of range ({num_stops} stops).")]
    StopOutOfRange { stop: StopIndex, num_stops: usize },
    #[error("Station index {station} is out of range ({num_stations} stations).")]
    StationOutOfRange { station: StationIndex, num_stations: usize },
    #[error("Route index {route} is out of range ({num_routes} routes).")]
    RouteOutOfRange { route: RouteIndex, num_routes: usize },
    #[error("Walking time {duration} from stop {from} to {to} is negative.")]
    NegativeDuration { from: StopIndex, to: StopIndex, duration: Timestamp },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub num_stops: u32,
    pub num_trips: TripIndex,
    pub route_stops_idx: usize,
    pub stop_times_idx: usize,
    pub trips_idx: usize,
}

impl Route {
    pub fn get_stops<'a>(&self, route_stops: &'a [StopIndex]) -> &'a [StopIndex] {
        &route_stops[self.route_stops_idx..(self.route_stops_idx + self.num_stops as usize)]
    }

    pub fn get_trip<'a>(&self, trip: usize, stop_times: &'a [StopTime]) -> &'a [StopTime] {
        let start = self.stop_times_idx + trip * self.num_stops as usize;
        let end = start + self.num_stops as usize;
        &stop_times[start..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTime {
    pub arrival_time: Timestamp,
    pub departure_time: Timestamp,
}

impl StopTime {
    pub fn new(arrival_time: Timestamp, departure_time: Timestamp) -> Self {
        Self { arrival_time, departure_time }
    }

    fn reversed(self) -> Self {
        Self { arrival_time: -self.departure_time, departure_time: -self.arrival_time }
    }
}

/// A directed walking connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Transfer {
    pub from: StopIndex,
    pub to: StopIndex,
    pub duration: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub name: Box<str>,
    pub station: StationIndex,
    pub routes_idx: usize,
    pub num_routes: usize,
    pub transfers_idx: usize,
    pub num_transfers: usize,
}

impl Stop {
    pub fn get_routes<'a>(&self, stop_routes: &'a [RouteIndex]) -> &'a [RouteIndex] {
        &stop_routes[self.routes_idx..(self.routes_idx + self.num_routes)]
    }

    pub fn get_transfers<'a>(&self, transfers: &'a [Transfer]) -> &'a [Transfer] {
        &transfers[self.transfers_idx..(self.transfers_idx + self.num_transfers)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub name: Box<str>,
    pub stops_idx: usize,
    pub num_stops: usize,
}

/// Immutable timetable. Built by [`crate::TimetableBuilder`], which validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub(crate) routes: Vec<Route>,
    pub(crate) stops: Vec<Stop>,
    pub(crate) stations: Vec<Station>,
    pub(crate) stop_index: HashMap<String, StopIndex>,
    pub(crate) station_index: HashMap<String, StationIndex>,
    pub(crate) stop_times: Vec<StopTime>,
    pub(crate) stop_routes: Vec<RouteIndex>,
    pub(crate) route_stops: Vec<StopIndex>,
    pub(crate) station_stops: Vec<StopIndex>,
    pub(crate) transfers: Vec<Transfer>,
    pub(crate) trip_ids: Vec<Box<str>>,
    pub(crate) t_min: Timestamp,
    pub(crate) t_max: Timestamp,
}

impl Network {
    pub fn get_stop(&self, stop: usize) -> &Stop { &self.stops[stop] }

    pub fn get_station(&self, station: usize) -> &Station { &self.stations[station] }

    pub fn get_route(&self, route: usize) -> &Route { &self.routes[route] }

    pub fn get_stop_idx(&self, stop_id: &str) -> Option<StopIndex> { self.stop_index.get(stop_id).copied() }

    pub fn get_station_idx(&self, station_id: &str) -> Option<StationIndex> {
        self.station_index.get(station_id).copied()
    }

    pub fn stop_name(&self, stop: StopIndex) -> &str { &self.stops[stop as usize].name }

    pub fn station_name(&self, station: StationIndex) -> &str { &self.stations[station as usize].name }

    pub fn station_of(&self, stop: StopIndex) -> StationIndex { self.stops[stop as usize].station }

    pub fn stops_of_station(&self, station: StationIndex) -> &[StopIndex] {
        let station = &self.stations[station as usize];
        &self.station_stops[station.stops_idx..(station.stops_idx + station.num_stops)]
    }

    pub fn num_stops(&self) -> usize { self.stops.len() }

    pub fn num_stations(&self) -> usize { self.stations.len() }

    pub fn num_routes(&self) -> usize { self.routes.len() }

    pub fn num_trips(&self, route_idx: usize) -> usize { self.routes[route_idx].num_trips as usize }

    pub fn num_stops_in_route(&self, route_idx: usize) -> usize { self.routes[route_idx].num_stops as usize }

    pub fn total_trips(&self) -> usize { self.trip_ids.len() }

    pub fn route_stops(&self, route_idx: usize) -> &[StopIndex] {
        self.routes[route_idx].get_stops(&self.route_stops)
    }

    pub fn routes_of_stop(&self, stop: StopIndex) -> &[RouteIndex] {
        self.stops[stop as usize].get_routes(&self.stop_routes)
    }

    pub fn transfers_from(&self, stop: StopIndex) -> &[Transfer] {
        self.stops[stop as usize].get_transfers(&self.transfers)
    }

    pub fn get_trip(&self, route_idx: usize, trip_idx: usize) -> &[StopTime] {
        let route = &self.routes[route_idx];
        route.get_trip(trip_idx, &self.stop_times)
    }

    pub fn trip_id(&self, route_idx: usize, trip_idx: usize) -> &str {
        &self.trip_ids[self.routes[route_idx].trips_idx + trip_idx]
    }

    /// Latest time appearing in any trip.
    pub fn t_max(&self) -> Timestamp { self.t_max }

    /// Earliest time appearing in any trip.
    pub fn t_min(&self) -> Timestamp { self.t_min }

    pub fn print_stats(&self) {
        info!(
            "Network with {} routes, {} stations, {} stops, {} trips and {} transfers.",
            self.num_routes(),
            self.num_stations(),
            self.num_stops(),
            self.total_trips(),
            self.transfers.len()
        );
    }

    /// Returns the same network on a negated time axis: journeys from `a` to
    /// `b` departing at `t` become journeys from `b` to `a` arriving at `-t`.
    /// Route and stop ids are preserved.
    pub fn reverse(&self) -> Network {
        let mut route_stops = self.route_stops.clone();
        let mut stop_times = self.stop_times.clone();
        let mut trip_ids = self.trip_ids.clone();

        for route in &self.routes {
            let num_stops = route.num_stops as usize;
            let num_trips = route.num_trips as usize;
            route_stops[route.route_stops_idx..route.route_stops_idx + num_stops].reverse();
            trip_ids[route.trips_idx..route.trips_idx + num_trips].reverse();

            for trip_idx in 0..num_trips {
                let original = route.get_trip(num_trips - 1 - trip_idx, &self.stop_times);
                let start = route.stop_times_idx + trip_idx * num_stops;
                for (target, stop_time) in stop_times[start..start + num_stops].iter_mut().zip(original.iter().rev()) {
                    *target = stop_time.reversed();
                }
            }
        }

        let transfers = self
            .transfers
            .iter()
            .map(|transfer| Transfer { from: transfer.to, to: transfer.from, duration: transfer.duration })
            .collect();
        let mut stops = self.stops.clone();
        let transfers = index_transfers(&mut stops, transfers);

        Network {
            routes: self.routes.clone(),
            stops,
            stations: self.stations.clone(),
            stop_index: self.stop_index.clone(),
            station_index: self.station_index.clone(),
            stop_times,
            stop_routes: self.stop_routes.clone(),
            route_stops,
            station_stops: self.station_stops.clone(),
            transfers,
            trip_ids,
            t_min: -self.t_max,
            t_max: -self.t_min,
        }
    }

    /// Checks every invariant the search relies on: id ranges, monotone trips
    /// and FIFO ordering of trips within a route.
    pub fn validate(&self) -> Result<(), ConsistencyError> {
        let num_stops = self.stops.len();
        let num_routes = self.routes.len();
        let num_stations = self.stations.len();
        let check_stop = |stop: StopIndex| {
            if (stop as usize) < num_stops {
                Ok(())
            } else {
                Err(ConsistencyError::StopOutOfRange { stop, num_stops })
            }
        };

        for stop in &self.stops {
            if stop.station as usize >= num_stations {
                return Err(ConsistencyError::StationOutOfRange { station: stop.station, num_stations });
            }
            for &route in stop.get_routes(&self.stop_routes) {
                if route as usize >= num_routes {
                    return Err(ConsistencyError::RouteOutOfRange { route, num_routes });
                }
            }
        }
        for &stop in &self.station_stops {
            check_stop(stop)?;
        }
        for transfer in &self.transfers {
            check_stop(transfer.from)?;
            check_stop(transfer.to)?;
            if transfer.duration < 0 {
                return Err(ConsistencyError::NegativeDuration {
                    from: transfer.from,
                    to: transfer.to,
                    duration: transfer.duration,
                });
            }
        }

        for (route_idx, route) in self.routes.iter().enumerate() {
            let route_id = route_idx as RouteIndex;
            if route.num_stops == 0 || route.num_trips == 0 {
                return Err(ConsistencyError::EmptyRoute { route: route_id });
            }
            for &stop in route.get_stops(&self.route_stops) {
                check_stop(stop)?;
            }

            let mut previous: Option<&[StopTime]> = None;
            for trip_idx in 0..route.num_trips as usize {
                let trip = route.get_trip(trip_idx, &self.stop_times);
                let trip_name = || self.trip_id(route_idx, trip_idx).to_string();

                let mut last = -TIME_LIMIT;
                for (position, stop_time) in trip.iter().enumerate() {
                    for time in [stop_time.arrival_time, stop_time.departure_time] {
                        if !(-TIME_LIMIT..TIME_LIMIT).contains(&time) {
                            return Err(ConsistencyError::TimeOutOfRange { trip: trip_name(), time });
                        }
                    }
                    if stop_time.arrival_time < last || stop_time.departure_time < stop_time.arrival_time {
                        return Err(ConsistencyError::DecreasingTimes { route: route_id, trip: trip_name(), position });
                    }
                    last = stop_time.departure_time;
                }

                if let Some(previous) = previous {
                    let overtaken = previous.iter().zip(trip).position(|(earlier, later)| {
                        later.arrival_time < earlier.arrival_time || later.departure_time < earlier.departure_time
                    });
                    if let Some(position) = overtaken {
                        return Err(ConsistencyError::FifoViolation { route: route_id, trip: trip_name(), position });
                    }
                }
                previous = Some(trip);
            }
        }

        Ok(())
    }
}

/// Sorts transfers by source stop and points every stop at its slice.
pub(crate) fn index_transfers(stops: &mut [Stop], mut transfers: Vec<Transfer>) -> Vec<Transfer> {
    transfers.sort_unstable();
    let mut start = 0;
    for (stop_idx, stop) in stops.iter_mut().enumerate() {
        let end = start + transfers[start..].partition_point(|transfer| transfer.from as usize <= stop_idx);
        stop.transfers_idx = start;
        stop.num_transfers = end - start;
        start = end;
    }
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimetableBuilder;

    fn two_route_network() -> Network {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", Some("Central"));
        let b = builder.add_stop("B", Some("Central"));
        let c = builder.add_stop("C", None);
        builder.add_trip("t1", vec![(a, StopTime::new(100, 110)), (c, StopTime::new(200, 200))]);
        builder.add_trip("t2", vec![(a, StopTime::new(150, 160)), (c, StopTime::new(260, 270))]);
        builder.add_trip("t3", vec![(c, StopTime::new(300, 300)), (b, StopTime::new(400, 410))]);
        builder.add_transfer(a, b, 120);
        builder.build().unwrap()
    }

    #[test]
    fn exposes_structure() {
        let network = two_route_network();
        assert_eq!(network.num_stops(), 3);
        assert_eq!(network.num_stations(), 2);
        assert_eq!(network.num_routes(), 2);
        assert_eq!(network.t_min(), 100);
        assert_eq!(network.t_max(), 410);

        let central = network.get_station_idx("Central").unwrap();
        let a = network.get_stop_idx("A").unwrap();
        let b = network.get_stop_idx("B").unwrap();
        assert_eq!(network.station_of(a), central);
        assert_eq!(network.stops_of_station(central), &[a, b]);
        assert_eq!(network.transfers_from(a), &[Transfer { from: a, to: b, duration: 120 }]);
        assert!(network.transfers_from(b).is_empty());
    }

    #[test]
    fn reverse_negates_times_and_flips_transfers() {
        let network = two_route_network();
        let reversed = network.reverse();
        reversed.validate().unwrap();

        let a = network.get_stop_idx("A").unwrap();
        let b = network.get_stop_idx("B").unwrap();
        let c = network.get_stop_idx("C").unwrap();
        assert_eq!(reversed.transfers_from(b), &[Transfer { from: b, to: a, duration: 120 }]);
        assert_eq!(reversed.t_min(), -410);
        assert_eq!(reversed.t_max(), -100);

        let route = reversed.routes_of_stop(a)[0] as usize;
        assert_eq!(reversed.route_stops(route), &[c, a]);
        // The later forward trip comes first once time runs backwards.
        assert_eq!(reversed.trip_id(route, 0), "t2");
        assert_eq!(reversed.get_trip(route, 0), &[StopTime::new(-270, -260), StopTime::new(-160, -150)]);
    }

    #[test]
    fn reverse_twice_is_identity() {
        let network = two_route_network();
        assert_eq!(network.reverse().reverse(), network);
    }

    #[test]
    fn validate_rejects_overtaking_trips() {
        let mut network = two_route_network();
        let route = network.routes_of_stop(0)[0] as usize;
        let second = network.routes[route].stop_times_idx + network.routes[route].num_stops as usize;
        network.stop_times[second + 1] = StopTime::new(190, 195);
        assert!(matches!(network.validate(), Err(ConsistencyError::FifoViolation { position: 1, .. })));
    }

    #[test]
    fn validate_rejects_bad_ids_and_durations() {
        let mut network = two_route_network();
        network.route_stops[0] = 42;
        assert!(matches!(network.validate(), Err(ConsistencyError::StopOutOfRange { stop: 42, .. })));

        let mut network = two_route_network();
        network.transfers[0].duration = -1;
        assert!(matches!(network.validate(), Err(ConsistencyError::NegativeDuration { .. })));

        let mut network = two_route_network();
        network.stops[0].station = 9;
        assert!(matches!(network.validate(), Err(ConsistencyError::StationOutOfRange { station: 9, .. })));
    }

    #[test]
    fn validate_rejects_negative_dwell() {
        let mut network = two_route_network();
        let idx = network.routes[0].stop_times_idx;
        network.stop_times[idx] = StopTime::new(120, 110);
        assert!(matches!(network.validate(), Err(ConsistencyError::DecreasingTimes { position: 0, .. })));
    }
}
