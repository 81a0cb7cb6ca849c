use std::collections::HashMap;

use log::debug;

use crate::network::{
    index_transfers, ConsistencyError, Network, Route, RouteIndex, Station, StationIndex, Stop, StopIndex, StopTime,
    Timestamp, Transfer, TripIndex,
};

struct RawTrip {
    id: String,
    times: Vec<StopTime>,
}

/// Collects stops, trips and transfers and turns them into a validated [`Network`].
#[derive(Default)]
pub struct TimetableBuilder {
    stop_names: Vec<String>,
    stop_stations: Vec<Option<String>>,
    stop_index: HashMap<String, StopIndex>,
    trips: Vec<(Vec<StopIndex>, RawTrip)>,
    transfers: Vec<Transfer>,
}

// A later trip must not arrive or depart earlier than an earlier one anywhere.
fn overtakes(earlier: &[StopTime], later: &[StopTime]) -> bool {
    earlier
        .iter()
        .zip(later)
        .any(|(e, l)| l.arrival_time < e.arrival_time || l.departure_time < e.departure_time)
}

impl TimetableBuilder {
    pub fn new() -> Self { Self::default() }

    /// Registers a stop, or returns the existing index if the id is known.
    /// A stop without a station becomes its own station.
    pub fn add_stop(&mut self, id: &str, station: Option<&str>) -> StopIndex {
        if let Some(&stop_idx) = self.stop_index.get(id) {
            if let Some(station) = station {
                self.stop_stations[stop_idx as usize].get_or_insert_with(|| station.to_string());
            }
            return stop_idx;
        }
        let stop_idx = self.stop_names.len() as StopIndex;
        self.stop_index.insert(id.to_string(), stop_idx);
        self.stop_names.push(id.to_string());
        self.stop_stations.push(station.map(str::to_string));
        stop_idx
    }

    pub fn get_stop_idx(&self, id: &str) -> Option<StopIndex> { self.stop_index.get(id).copied() }

    pub fn num_stops(&self) -> usize { self.stop_names.len() }

    pub fn num_trips(&self) -> usize { self.trips.len() }

    /// Adds a trip as its ordered (stop, times) sequence.
    pub fn add_trip(&mut self, id: &str, stop_times: Vec<(StopIndex, StopTime)>) {
        let (stops, times) = stop_times.into_iter().unzip();
        self.trips.push((stops, RawTrip { id: id.to_string(), times }));
    }

    pub fn add_transfer(&mut self, from: StopIndex, to: StopIndex, duration: Timestamp) {
        self.transfers.push(Transfer { from, to, duration });
    }

    pub fn build(self) -> Result<Network, ConsistencyError> {
        let num_stops = self.stop_names.len();
        let check_stop = |stop: StopIndex| {
            if (stop as usize) < num_stops {
                Ok(())
            } else {
                Err(ConsistencyError::StopOutOfRange { stop, num_stops })
            }
        };
        for (stops, _) in &self.trips {
            stops.iter().try_for_each(|&stop| check_stop(stop))?;
        }
        for transfer in &self.transfers {
            check_stop(transfer.from)?;
            check_stop(transfer.to)?;
        }

        // Stations, in order of first appearance.
        let mut stations = Vec::new();
        let mut station_index: HashMap<String, StationIndex> = HashMap::new();
        let mut stops = Vec::with_capacity(num_stops);
        for (name, station) in self.stop_names.into_iter().zip(self.stop_stations) {
            let station_name = station.unwrap_or_else(|| name.clone());
            let station_idx = *station_index.entry(station_name.clone()).or_insert_with(|| {
                stations.push(Station { name: station_name.into_boxed_str(), stops_idx: 0, num_stops: 0 });
                (stations.len() - 1) as StationIndex
            });
            stops.push(Stop {
                name: name.into_boxed_str(),
                station: station_idx,
                routes_idx: 0,
                num_routes: 0,
                transfers_idx: 0,
                num_transfers: 0,
            });
        }
        let mut station_stops = Vec::with_capacity(stops.len());
        let mut stops_by_station = vec![Vec::new(); stations.len()];
        for (stop_idx, stop) in stops.iter().enumerate() {
            stops_by_station[stop.station as usize].push(stop_idx as StopIndex);
        }
        for (station, station_members) in stations.iter_mut().zip(stops_by_station) {
            station.stops_idx = station_stops.len();
            station.num_stops = station_members.len();
            station_stops.extend(station_members);
        }

        // Group trips into patterns, keeping the order in which patterns first appear.
        let mut pattern_index: HashMap<Vec<StopIndex>, usize> = HashMap::new();
        let mut patterns: Vec<(Vec<StopIndex>, Vec<RawTrip>)> = Vec::new();
        let mut num_dropped = 0;
        for (trip_stops, trip) in self.trips {
            if trip_stops.len() < 2 {
                num_dropped += 1;
                continue;
            }
            match pattern_index.get(&trip_stops) {
                Some(&pattern) => patterns[pattern].1.push(trip),
                None => {
                    pattern_index.insert(trip_stops.clone(), patterns.len());
                    patterns.push((trip_stops, vec![trip]));
                }
            }
        }
        if num_dropped > 0 {
            debug!("Dropped {num_dropped} trips with fewer than two stop times.");
        }

        // Split every pattern into FIFO routes.
        let mut routes = Vec::new();
        let mut route_stops = Vec::new();
        let mut stop_times = Vec::new();
        let mut trip_ids = Vec::new();
        let mut num_split = 0;
        for (pattern_stops, mut pattern_trips) in patterns {
            pattern_trips.sort_by(|a, b| {
                a.times[0].departure_time.cmp(&b.times[0].departure_time).then_with(|| {
                    let key = |stop_time: &StopTime| (stop_time.departure_time, stop_time.arrival_time);
                    a.times.iter().map(key).cmp(b.times.iter().map(key))
                })
            });

            let mut groups: Vec<Vec<RawTrip>> = Vec::new();
            for trip in pattern_trips {
                let group = groups
                    .iter_mut()
                    .find(|group| group.last().map_or(true, |last| !overtakes(&last.times, &trip.times)));
                match group {
                    Some(group) => group.push(trip),
                    None => groups.push(vec![trip]),
                }
            }
            num_split += groups.len() - 1;

            for group in groups {
                routes.push(Route {
                    num_stops: pattern_stops.len() as u32,
                    num_trips: group.len() as TripIndex,
                    route_stops_idx: route_stops.len(),
                    stop_times_idx: stop_times.len(),
                    trips_idx: trip_ids.len(),
                });
                route_stops.extend_from_slice(&pattern_stops);
                for trip in group {
                    stop_times.extend(trip.times);
                    trip_ids.push(trip.id.into_boxed_str());
                }
            }
        }
        if num_split > 0 {
            debug!("Split off {num_split} routes to keep trips first-in first-out.");
        }

        // Index the routes for a given stop.
        let mut routes_by_stop = vec![Vec::new(); stops.len()];
        for (route_idx, route) in routes.iter().enumerate() {
            for &stop in route.get_stops(&route_stops) {
                let stop_routes: &mut Vec<RouteIndex> = &mut routes_by_stop[stop as usize];
                if stop_routes.last() != Some(&(route_idx as RouteIndex)) {
                    stop_routes.push(route_idx as RouteIndex);
                }
            }
        }
        let mut stop_routes = Vec::new();
        for (stop, stop_route_list) in stops.iter_mut().zip(routes_by_stop) {
            stop.routes_idx = stop_routes.len();
            stop.num_routes = stop_route_list.len();
            stop_routes.extend(stop_route_list);
        }

        // Keep the shortest walk per ordered pair.
        let mut shortest: HashMap<(StopIndex, StopIndex), Timestamp> = HashMap::new();
        for transfer in self.transfers.into_iter().filter(|transfer| transfer.from != transfer.to) {
            let duration = shortest.entry((transfer.from, transfer.to)).or_insert(transfer.duration);
            *duration = (*duration).min(transfer.duration);
        }
        let transfers = shortest
            .into_iter()
            .map(|((from, to), duration)| Transfer { from, to, duration })
            .collect();
        let transfers = index_transfers(&mut stops, transfers);

        let t_min = stop_times.iter().map(|stop_time| stop_time.arrival_time).min().unwrap_or(0);
        let t_max = stop_times.iter().map(|stop_time| stop_time.departure_time).max().unwrap_or(0);

        let stop_index = stops
            .iter()
            .enumerate()
            .map(|(i, stop)| (stop.name.to_string(), i as StopIndex))
            .collect();

        let network = Network {
            routes,
            stops,
            stations,
            stop_index,
            station_index,
            stop_times,
            stop_routes,
            route_stops,
            station_stops,
            transfers,
            trip_ids,
            t_min,
            t_max,
        };
        network.validate()?;

        debug!(
            "Built network with {} routes, {} stations and {} stops.",
            network.num_routes(),
            network.num_stations(),
            network.num_stops()
        );
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_trips_by_pattern() {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        let b = builder.add_stop("B", None);
        let c = builder.add_stop("C", None);
        builder.add_trip("late", vec![(a, StopTime::new(200, 200)), (b, StopTime::new(300, 300))]);
        builder.add_trip("early", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(150, 150))]);
        builder.add_trip("other", vec![(b, StopTime::new(100, 100)), (c, StopTime::new(150, 150))]);
        let network = builder.build().unwrap();

        assert_eq!(network.num_routes(), 2);
        assert_eq!(network.num_trips(0), 2);
        assert_eq!(network.trip_id(0, 0), "early");
        assert_eq!(network.trip_id(0, 1), "late");
        assert_eq!(network.routes_of_stop(b), &[0, 1]);
        assert_eq!(network.routes_of_stop(c), &[1]);
    }

    #[test]
    fn splits_overtaking_trips_into_separate_routes() {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        let b = builder.add_stop("B", None);
        builder.add_trip("slow", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(500, 500))]);
        builder.add_trip("express", vec![(a, StopTime::new(200, 200)), (b, StopTime::new(300, 300))]);
        builder.add_trip("next", vec![(a, StopTime::new(600, 600)), (b, StopTime::new(700, 700))]);
        let network = builder.build().unwrap();

        assert_eq!(network.num_routes(), 2);
        assert_eq!(network.num_trips(0), 2);
        assert_eq!(network.trip_id(0, 0), "slow");
        assert_eq!(network.trip_id(0, 1), "next");
        assert_eq!(network.trip_id(1, 0), "express");
    }

    #[test]
    fn drops_short_trips_and_self_transfers() {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        let b = builder.add_stop("B", None);
        builder.add_trip("lonely", vec![(a, StopTime::new(100, 100))]);
        builder.add_transfer(a, a, 30);
        builder.add_transfer(a, b, 90);
        builder.add_transfer(a, b, 60);
        let network = builder.build().unwrap();

        assert_eq!(network.num_routes(), 0);
        assert_eq!(network.transfers_from(a), &[Transfer { from: a, to: b, duration: 60 }]);
    }

    #[test]
    fn rejects_unknown_stops_and_backwards_trips() {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        builder.add_transfer(a, 7, 60);
        assert!(matches!(builder.build(), Err(ConsistencyError::StopOutOfRange { stop: 7, .. })));

        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        let b = builder.add_stop("B", None);
        builder.add_trip("back", vec![(a, StopTime::new(300, 300)), (b, StopTime::new(200, 200))]);
        assert!(matches!(builder.build(), Err(ConsistencyError::DecreasingTimes { position: 1, .. })));
    }

    #[test]
    fn later_station_assignment_wins_over_none() {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        assert_eq!(builder.add_stop("A", Some("S")), a);
        let network = builder.build().unwrap();
        assert_eq!(network.station_name(network.station_of(a)), "S");
    }
}
