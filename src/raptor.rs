use crate::footpaths::FootpathHubIndex;
use crate::journey::{Boarding, Journey, JourneyResult, Labels, Parent};
use crate::network::{Network, RouteIndex, StopIndex, Timestamp, TripIndex, INFINITY};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaptorConfig {
    /// Minimum wait between arriving at a stop and boarding there. The source
    /// stop of a query is exempt.
    pub min_change_time: Timestamp,
    /// Maximum number of trips per journey; `None` runs to a fixpoint.
    pub max_rounds: Option<usize>,
}

impl Default for RaptorConfig {
    fn default() -> Self {
        RaptorConfig { min_change_time: 60, max_rounds: None }
    }
}

/// Labels that cannot lead to an improvement at the target are not recorded.
#[derive(Clone, Copy)]
pub(crate) struct Pruning<'b> {
    pub target: Option<StopIndex>,
    /// Arrivals at or after this time are useless.
    pub arrival_bound: Timestamp,
    /// Per stop, the latest time from which the target can still be reached.
    pub latest_departure: Option<&'b [Timestamp]>,
}

impl Pruning<'static> {
    pub const NONE: Self = Pruning { target: None, arrival_bound: INFINITY, latest_departure: None };
}

impl Pruning<'_> {
    /// Whether a label at `stop` improves on `current`, the best label of its
    /// kind there, and can still matter for the target.
    #[inline]
    fn admits(&self, current: Timestamp, arrivals: &[Timestamp], stop: usize, time: Timestamp) -> bool {
        let target_time = match self.target {
            Some(target) => arrivals[target as usize].min(self.arrival_bound),
            None => self.arrival_bound,
        };
        time < current.min(target_time) && self.latest_departure.map_or(true, |latest| time <= latest[stop])
    }
}

// Best arrival at a hub during footpath relaxation, and the stop it was reached from.
#[derive(Clone, Copy)]
struct HubLabel {
    time: Timestamp,
    from: StopIndex,
    departure_time: Timestamp,
}

const UNREACHED_HUB: HubLabel = HubLabel { time: INFINITY, from: 0, departure_time: INFINITY };

/// Round-based earliest arrival search over one network direction. Holds
/// only per-query scratch buffers, so one engine can serve many queries.
pub struct Raptor<'a> {
    network: &'a Network,
    footpaths: &'a FootpathHubIndex,
    config: RaptorConfig,
    // τ*[p] = earliest known arrival at stop p over all rounds so far.
    arrivals: Vec<Timestamp>,
    parents: Vec<Option<Parent>>,
    // Earliest arrival at p on board a trip. Walks leave from these, so a stop
    // reached on foot early does not hide a trip arrival that walks on.
    trip_arrivals: Vec<Timestamp>,
    trip_parents: Vec<Option<Boarding>>,
    // τ_{k-1}[p], used for boarding in round k.
    previous_arrivals: Vec<Timestamp>,
    marked_stops: Vec<bool>,
    // Stops whose trip arrival improved in this round.
    alighted_stops: Vec<bool>,
    // The equivalent of the set Q in the paper.
    earliest_stop_for_route: Vec<Option<usize>>,
    walk_sources: Vec<(StopIndex, Timestamp)>,
    hub_labels: Vec<HubLabel>,
    touched_hubs: Vec<usize>,
    num_rounds: usize,
}

impl<'a> Raptor<'a> {
    pub fn new(network: &'a Network, footpaths: &'a FootpathHubIndex, config: RaptorConfig) -> Self {
        assert_eq!(
            network.num_stops(),
            footpaths.num_stops(),
            "Footpath index was built for a different network."
        );
        let num_stops = network.num_stops();
        Self {
            network,
            footpaths,
            config,
            arrivals: vec![INFINITY; num_stops],
            parents: vec![None; num_stops],
            trip_arrivals: vec![INFINITY; num_stops],
            trip_parents: vec![None; num_stops],
            previous_arrivals: vec![INFINITY; num_stops],
            marked_stops: vec![false; num_stops],
            alighted_stops: vec![false; num_stops],
            earliest_stop_for_route: vec![None; network.num_routes()],
            walk_sources: Vec::new(),
            hub_labels: vec![UNREACHED_HUB; footpaths.num_hubs()],
            touched_hubs: Vec::new(),
            num_rounds: 0,
        }
    }

    pub fn network(&self) -> &'a Network { self.network }

    pub fn config(&self) -> &RaptorConfig { &self.config }

    /// Rounds (trip boardings) performed by the last query.
    pub fn num_rounds(&self) -> usize { self.num_rounds }

    /// Earliest arrival at every stop when leaving `source` at `departure`;
    /// unreachable stops map to [`INFINITY`].
    pub fn earliest_arrival(&mut self, source: StopIndex, departure: Timestamp) -> &[Timestamp] {
        self.run(source, departure, Pruning::NONE);
        &self.arrivals
    }

    /// Earliest arrival journey from `start` to `end`.
    pub fn raptor_query(&mut self, start: StopIndex, start_time: Timestamp, end: StopIndex) -> JourneyResult<'a> {
        let pruning = Pruning { target: Some(end), ..Pruning::NONE };
        self.run(start, start_time, pruning);
        let labels = Labels {
            arrivals: &self.arrivals,
            parents: &self.parents,
            trip_arrivals: &self.trip_arrivals,
            trip_parents: &self.trip_parents,
        };
        Journey::from_parents(labels, self.network, start, end)
    }

    pub(crate) fn arrival_at(&self, stop: StopIndex) -> Timestamp { self.arrivals[stop as usize] }

    pub(crate) fn run(&mut self, source: StopIndex, departure: Timestamp, pruning: Pruning) {
        let source = source as usize;
        assert!(source < self.arrivals.len(), "Stop index {source} is out of range.");

        self.arrivals.fill(INFINITY);
        self.parents.fill(None);
        self.trip_arrivals.fill(INFINITY);
        self.trip_parents.fill(None);
        self.marked_stops.fill(false);
        self.alighted_stops.fill(false);

        // Set initial departure time from start station, and walk from there.
        self.arrivals[source] = departure;
        self.trip_arrivals[source] = departure;
        self.marked_stops[source] = true;
        self.alighted_stops[source] = true;
        self.relax_footpaths(&pruning);
        self.num_rounds = 0;

        // RAPTOR
        for k in 1.. {
            if self.config.max_rounds.is_some_and(|max_rounds| k > max_rounds) {
                break;
            }
            self.num_rounds = k;
            self.previous_arrivals.copy_from_slice(&self.arrivals);
            self.collect_routes();
            self.scan_routes(k, source, &pruning);
            self.relax_footpaths(&pruning);

            if utils::is_zero(&self.marked_stops) {
                break;
            }
        }
    }

    // Finds, for each route through a marked stop, the earliest marked position on it.
    fn collect_routes(&mut self) {
        let network = self.network;
        self.earliest_stop_for_route.fill(None);
        for marked_stop in self
            .marked_stops
            .iter()
            .enumerate()
            .filter_map(|(i, &touched)| touched.then_some(i))
        {
            for &route_idx in network.routes_of_stop(marked_stop as StopIndex) {
                let route_idx = route_idx as usize;
                let earliest_stop_in_route_order =
                    self.earliest_stop_for_route[route_idx].unwrap_or(network.num_stops_in_route(route_idx));

                let position = network.route_stops(route_idx)[..earliest_stop_in_route_order]
                    .iter()
                    .position(|&route_stop| route_stop as usize == marked_stop);
                if let Some(position) = position {
                    self.earliest_stop_for_route[route_idx] = Some(position);
                }
            }
        }
        self.marked_stops.fill(false);
    }

    // Traverse each marked route.
    fn scan_routes(&mut self, k: usize, source: usize, pruning: &Pruning) {
        let Raptor {
            network,
            config,
            arrivals,
            parents,
            trip_arrivals,
            trip_parents,
            previous_arrivals,
            marked_stops,
            alighted_stops,
            earliest_stop_for_route,
            ..
        } = self;

        for (route_idx, earliest_stop_order) in earliest_stop_for_route
            .iter()
            .enumerate()
            .filter_map(|(i, stop)| stop.map(|s| (i, s)))
        {
            let route = network.get_route(route_idx);
            let num_stops = route.num_stops as usize;

            // This keeps track of when and where we got on the current trip.
            let mut boarding: Option<Boarding> = None;
            for (stop_order, &stop_idx) in network.route_stops(route_idx).iter().enumerate().skip(earliest_stop_order) {
                let stop = stop_idx as usize;

                // Can the arrival time at this stop be improved in this round?
                let mut current_departure_time = None;
                if let Some(boarding) = &boarding {
                    let trip = network.get_trip(route_idx, boarding.trip_idx as usize);
                    let arrival_time = trip[stop_order].arrival_time;
                    current_departure_time = Some(trip[stop_order].departure_time);
                    if pruning.admits(trip_arrivals[stop], arrivals, stop, arrival_time) {
                        trip_arrivals[stop] = arrival_time;
                        trip_parents[stop] = Some(*boarding);
                        alighted_stops[stop] = true;
                        if arrival_time < arrivals[stop] {
                            arrivals[stop] = arrival_time;
                            parents[stop] = Some(Parent::Trip(*boarding));
                            marked_stops[stop] = true;
                        }
                    }
                }

                // Updating before boarding is fine: either this is the first stop of
                // the scan, set by the previous round, or another route reached it
                // faster in this round and boarding still uses the previous round.
                if previous_arrivals[stop] == INFINITY {
                    continue;
                }
                // Only the journey's first boarding is exempt from the change time.
                let change_time = if k == 1 && stop == source { 0 } else { config.min_change_time };
                let ready_time = previous_arrivals[stop].saturating_add(change_time);

                // Can we catch an earlier trip at this stop?
                if current_departure_time.map_or(true, |departure_time| ready_time <= departure_time) {
                    let current_trip_idx = match &boarding {
                        Some(boarding) => boarding.trip_idx as usize,
                        None => route.num_trips as usize,
                    };

                    // Because the trip index can only ever decrease, we start from the next earliest trip and work our way back.
                    // Thus, all trips are accessed at most once each round.
                    let found_trip = (0..current_trip_idx)
                        .rev()
                        .map(|trip_idx| {
                            let stop_time_idx = route.stop_times_idx + trip_idx * num_stops + stop_order;
                            (trip_idx, network.stop_times[stop_time_idx].departure_time)
                        })
                        .take_while(|&(_, departure_time)| ready_time <= departure_time)
                        .last();

                    if let Some((found_trip_idx, departure_time)) = found_trip {
                        boarding = Some(Boarding {
                            boarded_stop: stop_idx,
                            boarded_stop_order: stop_order as u32,
                            boarded_time: departure_time,
                            route_idx: route_idx as RouteIndex,
                            trip_idx: found_trip_idx as TripIndex,
                        });
                    }
                }
            }
        }
    }

    // Walks out of every stop a trip improved this round (or the source), via
    // direct transfers and via hubs. Stops reached on foot are marked for the
    // next round but not walked out of again.
    fn relax_footpaths(&mut self, pruning: &Pruning) {
        let Raptor {
            footpaths,
            arrivals,
            parents,
            trip_arrivals,
            marked_stops,
            alighted_stops,
            walk_sources,
            hub_labels,
            touched_hubs,
            ..
        } = self;

        walk_sources.clear();
        walk_sources.extend(
            alighted_stops
                .iter()
                .enumerate()
                .filter(|&(_, &alighted)| alighted)
                .map(|(stop, _)| (stop as StopIndex, trip_arrivals[stop])),
        );
        alighted_stops.fill(false);

        for &(from, departure_time) in walk_sources.iter() {
            for transfer in footpaths.transfers_from(from) {
                let stop = transfer.to as usize;
                let arrival_time = departure_time.saturating_add(transfer.duration);
                if pruning.admits(arrivals[stop], arrivals, stop, arrival_time) {
                    arrivals[stop] = arrival_time;
                    parents[stop] = Some(Parent::Walk { from, departure_time });
                    marked_stops[stop] = true;
                }
            }
            for link in footpaths.hubs_from(from) {
                let hub = link.hub as usize;
                let time = departure_time.saturating_add(link.duration);
                if time < hub_labels[hub].time {
                    if hub_labels[hub].time == INFINITY {
                        touched_hubs.push(hub);
                    }
                    hub_labels[hub] = HubLabel { time, from, departure_time };
                }
            }
        }

        for &hub in touched_hubs.iter() {
            let label = hub_labels[hub];
            for link in footpaths.stops_from_hub(hub as u32) {
                let stop = link.stop as usize;
                let arrival_time = label.time.saturating_add(link.duration);
                if pruning.admits(arrivals[stop], arrivals, stop, arrival_time) {
                    arrivals[stop] = arrival_time;
                    parents[stop] = Some(Parent::Walk { from: label.from, departure_time: label.departure_time });
                    marked_stops[stop] = true;
                }
            }
            hub_labels[hub] = UNREACHED_HUB;
        }
        touched_hubs.clear();
    }
}

/// Convenience wrapper running a single earliest arrival query.
pub fn raptor_query<'a>(
    network: &'a Network,
    footpaths: &'a FootpathHubIndex,
    config: RaptorConfig,
    start: StopIndex,
    start_time: Timestamp,
    end: StopIndex,
) -> JourneyResult<'a> {
    Raptor::new(network, footpaths, config).raptor_query(start, start_time, end)
}
