use fastrand::Rng;
use raptor::network::{StopIndex, StopTime, Timestamp};
use raptor::{FootpathHubIndex, HubEntry, Network, RaptorConfig, TimetableBuilder};

// Common example data for the tests and benchmarks.

#[derive(Debug, Clone, Copy)]
pub struct NetworkParams {
    pub num_stops: usize,
    pub num_lines: usize,
    pub max_line_length: usize,
    pub trips_per_line: usize,
    pub headway: Timestamp,
    pub num_transfers: usize,
    pub num_hubs: usize,
    /// Labels per stop and direction are drawn from `0..=max_hubs_per_stop`.
    pub max_hubs_per_stop: usize,
    pub first_departure: Timestamp,
}

impl NetworkParams {
    pub fn small() -> Self {
        Self {
            num_stops: 12,
            num_lines: 6,
            max_line_length: 5,
            trips_per_line: 6,
            headway: 300,
            num_transfers: 8,
            num_hubs: 4,
            max_hubs_per_stop: 1,
            first_departure: 0,
        }
    }

    pub fn large() -> Self {
        Self {
            num_stops: 2000,
            num_lines: 300,
            max_line_length: 30,
            trips_per_line: 60,
            headway: 600,
            num_transfers: 3000,
            num_hubs: 200,
            max_hubs_per_stop: 2,
            first_departure: 5 * 3600,
        }
    }
}

/// A random timetable with random hub labels. The same seed always gives the same network.
/// Trips are jittered, so some of them overtake each other.
pub fn random_network(seed: u64, params: &NetworkParams) -> (Network, FootpathHubIndex) {
    let mut rng = Rng::with_seed(seed);
    let mut builder = TimetableBuilder::new();
    let stops: Vec<StopIndex> = (0..params.num_stops)
        .map(|i| builder.add_stop(&format!("s{i}"), Some(&format!("st{}", i / 2))))
        .collect();

    for line in 0..params.num_lines {
        let length = rng.usize(2..=params.max_line_length.min(stops.len()).max(2));
        let mut line_stops = stops.clone();
        rng.shuffle(&mut line_stops);
        line_stops.truncate(length);
        let segments: Vec<Timestamp> = (1..length).map(|_| rng.i32(60..600)).collect();
        let offset = rng.i32(0..params.headway.max(1));

        for trip in 0..params.trips_per_line {
            let mut time = params.first_departure + offset + trip as Timestamp * params.headway;
            let mut stop_times = Vec::with_capacity(length);
            for (position, &stop) in line_stops.iter().enumerate() {
                let dwell = rng.i32(0..60);
                stop_times.push((stop, StopTime::new(time, time + dwell)));
                if let Some(&segment) = segments.get(position) {
                    time += dwell + segment + rng.i32(0..120);
                }
            }
            builder.add_trip(&format!("l{line}t{trip}"), stop_times);
        }
    }

    for _ in 0..params.num_transfers {
        let from = stops[rng.usize(..stops.len())];
        let to = stops[rng.usize(..stops.len())];
        builder.add_transfer(from, to, rng.i32(30..300));
    }
    let network = builder.build().expect("Generated network is inconsistent.");

    let mut in_hubs = Vec::new();
    let mut out_hubs = Vec::new();
    if params.num_hubs > 0 {
        for &stop in &stops {
            for _ in 0..rng.usize(0..=params.max_hubs_per_stop) {
                let hub = rng.u32(..params.num_hubs as u32);
                in_hubs.push(HubEntry { stop, hub, access_time: rng.i32(30..400) });
            }
            for _ in 0..rng.usize(0..=params.max_hubs_per_stop) {
                let hub = rng.u32(..params.num_hubs as u32);
                out_hubs.push(HubEntry { stop, hub, access_time: rng.i32(30..400) });
            }
        }
    }
    let footpaths = FootpathHubIndex::new(&network, &in_hubs, &out_hubs).expect("Generated hubs are inconsistent.");
    (network, footpaths)
}

pub fn get_example_config() -> RaptorConfig {
    RaptorConfig { min_change_time: 3 * 60, max_rounds: None }
}

pub fn get_example_start_time() -> Timestamp {
    raptor::utils::parse_time("08:30:00").unwrap()
}

/// A large network with a fixed source and target.
pub fn get_example_scenario() -> (Network, FootpathHubIndex, StopIndex, Timestamp, StopIndex) {
    let (network, footpaths) = random_network(2024, &NetworkParams::large());
    let start_time = get_example_start_time();
    let start = network.get_stop_idx("s0").unwrap();
    let end = network.get_stop_idx(&format!("s{}", network.num_stops() - 1)).unwrap();
    (network, footpaths, start, start_time, end)
}
