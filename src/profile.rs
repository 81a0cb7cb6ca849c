//! Profile queries: every Pareto-optimal (departure, arrival) pair for a
//! source/target pair over a departure window.
//!
//! The engine sweeps the candidate departures at the source from the latest
//! to the earliest and runs an earliest arrival search for each. A candidate
//! only contributes if it arrives strictly earlier than every later candidate
//! did, so the emitted pairs are non-dominated by construction.

use log::trace;

use crate::footpaths::FootpathHubIndex;
use crate::network::{Network, StopIndex, Timestamp, INFINITY};
use crate::pareto::ParetoFront;
use crate::raptor::{Pruning, Raptor, RaptorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Skip labels that provably cannot improve the front. Never changes the result.
    pub pruning: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        ProfileConfig { pruning: true }
    }
}

pub struct Profile<'a> {
    forward: Raptor<'a>,
    // Runs on the reversed network, from the target backwards in time.
    backward: Raptor<'a>,
    config: ProfileConfig,
    latest_departure: Vec<Timestamp>,
    departures: Vec<Timestamp>,
}

impl<'a> Profile<'a> {
    /// `reversed_network` and `reversed_footpaths` must be the reversals of
    /// `network` and `footpaths`.
    pub fn new(
        network: &'a Network,
        footpaths: &'a FootpathHubIndex,
        reversed_network: &'a Network,
        reversed_footpaths: &'a FootpathHubIndex,
        raptor_config: RaptorConfig,
        config: ProfileConfig,
    ) -> Self {
        assert_eq!(
            network.num_stops(),
            reversed_network.num_stops(),
            "Reversed network does not match the forward network."
        );
        Self {
            forward: Raptor::new(network, footpaths, raptor_config),
            backward: Raptor::new(reversed_network, reversed_footpaths, raptor_config),
            config,
            latest_departure: vec![INFINITY; network.num_stops()],
            departures: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProfileConfig { &self.config }

    pub fn set_pruning(&mut self, pruning: bool) { self.config.pruning = pruning; }

    /// Candidate departure times for `source`, latest first: every trip
    /// departure at the source within `[t_beg, t_end)` plus both window bounds.
    /// A window ending before it begins holds only `t_beg`.
    pub fn departure_candidates(&self, source: StopIndex, t_beg: Timestamp, t_end: Timestamp) -> Vec<Timestamp> {
        let mut departures = Vec::new();
        collect_departures(self.forward.network(), source, t_beg, t_end, &mut departures);
        departures
    }

    /// Computes the Pareto front of journeys from `source` to `target`
    /// departing in `[t_beg, t_end)`. An unreachable target gives an empty front.
    pub fn profile(&mut self, source: StopIndex, target: StopIndex, t_beg: Timestamp, t_end: Timestamp) -> ParetoFront {
        let mut departures = std::mem::take(&mut self.departures);
        collect_departures(self.forward.network(), source, t_beg, t_end, &mut departures);

        let mut front = ParetoFront::new();
        let mut best_arrival = INFINITY;
        let mut bounded = false;
        for &departure in &departures {
            let arrival = if self.config.pruning {
                let pruning = Pruning {
                    target: Some(target),
                    arrival_bound: best_arrival,
                    latest_departure: bounded.then_some(self.latest_departure.as_slice()),
                };
                self.forward.run(source, departure, pruning);
                self.forward.arrival_at(target)
            } else {
                self.forward.earliest_arrival(source, departure)[target as usize]
            };

            if arrival != INFINITY && arrival < best_arrival {
                front.offer(departure, arrival);
                best_arrival = arrival;
                if self.config.pruning && !bounded {
                    self.compute_latest_departures(target, arrival, t_beg);
                    bounded = true;
                }
            }
        }
        trace!("Profile {source} -> {target}: {} candidates, {} journeys.", departures.len(), front.len());

        self.departures = departures;
        front
    }

    // Latest time at each stop from which `target` is still reachable by
    // `arrival`. The backward search starts a change time early: it charges a
    // change when boarding after walking away from the target, which a
    // forward journey never does.
    fn compute_latest_departures(&mut self, target: StopIndex, arrival: Timestamp, t_beg: Timestamp) {
        let min_change_time = self.backward.config().min_change_time;
        let start = arrival.saturating_add(min_change_time);
        // Nothing is ever labelled before the window opens.
        let pruning = Pruning { arrival_bound: t_beg.saturating_neg().saturating_add(1), ..Pruning::NONE };
        self.backward.run(target, -start, pruning);

        for (stop, latest) in self.latest_departure.iter_mut().enumerate() {
            let reversed = self.backward.arrival_at(stop as StopIndex);
            *latest = if reversed == INFINITY { Timestamp::MIN } else { -reversed };
        }
    }
}

fn collect_departures(
    network: &Network,
    source: StopIndex,
    t_beg: Timestamp,
    t_end: Timestamp,
    departures: &mut Vec<Timestamp>,
) {
    departures.clear();
    let t_end = t_end.max(t_beg);
    departures.push(t_beg);
    departures.push(t_end);
    for &route_idx in network.routes_of_stop(source) {
        let route_idx = route_idx as usize;
        let route_stops = network.route_stops(route_idx);
        // Nothing departs from the last stop of a route.
        let boardable = &route_stops[..route_stops.len().saturating_sub(1)];
        for (stop_order, _) in boardable.iter().enumerate().filter(|&(_, &stop)| stop == source) {
            for trip_idx in 0..network.num_trips(route_idx) {
                let departure_time = network.get_trip(route_idx, trip_idx)[stop_order].departure_time;
                if (t_beg..t_end).contains(&departure_time) {
                    departures.push(departure_time);
                }
            }
        }
    }
    departures.sort_unstable_by(|a, b| b.cmp(a));
    departures.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StopTime;
    use crate::pareto::Label;
    use crate::TimetableBuilder;

    // Two connections A -> B: (100, 200) and (150, 230), plus a slow one at 50.
    fn network() -> Network {
        let mut builder = TimetableBuilder::new();
        let a = builder.add_stop("A", None);
        let b = builder.add_stop("B", None);
        builder.add_trip("slow", vec![(a, StopTime::new(50, 50)), (b, StopTime::new(400, 400))]);
        builder.add_trip("fast", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(200, 200))]);
        builder.add_trip("late", vec![(a, StopTime::new(150, 150)), (b, StopTime::new(230, 230))]);
        builder.build().unwrap()
    }

    fn labels(front: &ParetoFront) -> Vec<(Timestamp, Timestamp)> {
        front.iter().map(|&Label { departure, arrival }| (departure, arrival)).collect()
    }

    #[test]
    fn candidates_include_window_bounds() {
        let network = network();
        let reversed = network.reverse();
        let footpaths = FootpathHubIndex::empty(&network);
        let reversed_footpaths = footpaths.reverse();
        let profile = Profile::new(
            &network,
            &footpaths,
            &reversed,
            &reversed_footpaths,
            RaptorConfig::default(),
            ProfileConfig::default(),
        );

        assert_eq!(profile.departure_candidates(0, 0, 1000), vec![1000, 150, 100, 50, 0]);
        assert_eq!(profile.departure_candidates(0, 100, 150), vec![150, 100]);
        assert_eq!(profile.departure_candidates(1, 0, 1000), vec![1000, 0]);
        assert_eq!(profile.departure_candidates(0, 120, 40), vec![120]);
        assert_eq!(profile.departure_candidates(0, 100, 100), vec![100]);
    }

    #[test]
    fn sweeps_latest_first() {
        let network = network();
        let reversed = network.reverse();
        let footpaths = FootpathHubIndex::empty(&network);
        let reversed_footpaths = footpaths.reverse();

        for pruning in [true, false] {
            let mut profile = Profile::new(
                &network,
                &footpaths,
                &reversed,
                &reversed_footpaths,
                RaptorConfig::default(),
                ProfileConfig { pruning },
            );
            let front = profile.profile(0, 1, 0, 1000);
            assert_eq!(labels(&front), vec![(150, 230), (100, 200)]);
            assert!(profile.profile(1, 0, 0, 1000).is_empty());
        }
    }

    #[test]
    fn window_excludes_later_trips() {
        let network = network();
        let reversed = network.reverse();
        let footpaths = FootpathHubIndex::empty(&network);
        let reversed_footpaths = footpaths.reverse();
        let mut profile = Profile::new(
            &network,
            &footpaths,
            &reversed,
            &reversed_footpaths,
            RaptorConfig::default(),
            ProfileConfig::default(),
        );

        // The 150 trip is outside [0, 120), but the 120 sentinel still catches it.
        let front = profile.profile(0, 1, 0, 120);
        assert_eq!(labels(&front), vec![(120, 230), (100, 200)]);
        // Leaving at 50 still means waiting for the 100 trip.
        let front = profile.profile(0, 1, 0, 100);
        assert_eq!(labels(&front), vec![(100, 200)]);
        // An inverted window only departs at its start.
        let front = profile.profile(0, 1, 120, 40);
        assert_eq!(labels(&front), vec![(120, 230)]);
    }
}
