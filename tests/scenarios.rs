use raptor::network::{StopIndex, StopTime, Timestamp, INFINITY};
use raptor::{FootpathHubIndex, Network, Profile, ProfileConfig, Raptor, RaptorConfig, TimetableBuilder};

const CHANGE: Timestamp = 60;

fn config() -> RaptorConfig {
    RaptorConfig { min_change_time: CHANGE, max_rounds: None }
}

fn profile_pairs(network: &Network, source: StopIndex, target: StopIndex, t_beg: Timestamp, t_end: Timestamp) -> Vec<(Timestamp, Timestamp)> {
    let footpaths = FootpathHubIndex::empty(network);
    let reversed = network.reverse();
    let reversed_footpaths = footpaths.reverse();
    let mut fronts = Vec::new();
    for pruning in [true, false] {
        let mut profile = Profile::new(network, &footpaths, &reversed, &reversed_footpaths, config(), ProfileConfig { pruning });
        let front = profile.profile(source, target, t_beg, t_end);
        fronts.push(front.iter().map(|label| (label.departure, label.arrival)).collect::<Vec<_>>());
    }
    assert_eq!(fronts[0], fronts[1]);
    fronts.swap_remove(0)
}

#[test]
fn single_trip() {
    let mut builder = TimetableBuilder::new();
    let a = builder.add_stop("0", None);
    let b = builder.add_stop("1", None);
    builder.add_trip("trip", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(200, 200))]);
    let network = builder.build().unwrap();

    assert_eq!(profile_pairs(&network, a, b, 0, 300), vec![(100, 200)]);
}

#[test]
fn two_trips_are_both_optimal() {
    let mut builder = TimetableBuilder::new();
    let a = builder.add_stop("0", None);
    let b = builder.add_stop("1", None);
    builder.add_trip("early", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(200, 200))]);
    builder.add_trip("late", vec![(a, StopTime::new(150, 150)), (b, StopTime::new(230, 230))]);
    let network = builder.build().unwrap();
    assert_eq!(network.num_routes(), 1);

    assert_eq!(profile_pairs(&network, a, b, 0, 300), vec![(150, 230), (100, 200)]);
}

#[test]
fn unconnected_target_gives_empty_front() {
    let mut builder = TimetableBuilder::new();
    let a = builder.add_stop("0", None);
    let b = builder.add_stop("1", None);
    let c = builder.add_stop("2", None);
    builder.add_trip("trip", vec![(a, StopTime::new(100, 100)), (b, StopTime::new(200, 200))]);
    let network = builder.build().unwrap();

    assert!(profile_pairs(&network, a, c, 0, 300).is_empty());
    assert!(profile_pairs(&network, b, a, 0, 300).is_empty());
    // The only trip leaves before the window opens.
    assert!(profile_pairs(&network, a, b, 101, 300).is_empty());
}

// Arrive at X at 1000, then either change at X or walk 300s to Y.
fn change_network(departure_at_x: Timestamp, departure_at_y: Timestamp) -> (Network, [StopIndex; 5]) {
    let mut builder = TimetableBuilder::new();
    let s = builder.add_stop("S", None);
    let x = builder.add_stop("X", None);
    let y = builder.add_stop("Y", None);
    let t1 = builder.add_stop("T1", None);
    let t2 = builder.add_stop("T2", None);
    builder.add_trip("in", vec![(s, StopTime::new(900, 900)), (x, StopTime::new(1000, 1000))]);
    builder.add_trip("from-x", vec![(x, StopTime::new(departure_at_x, departure_at_x)), (t1, StopTime::new(5000, 5000))]);
    builder.add_trip("from-y", vec![(y, StopTime::new(departure_at_y, departure_at_y)), (t2, StopTime::new(5000, 5000))]);
    builder.add_transfer(x, y, 300);
    (builder.build().unwrap(), [s, x, y, t1, t2])
}

#[test]
fn change_time_boundary() {
    let cases = [
        (1000 + 250, 1000 + 300 + 250, true),
        (1000 + CHANGE, 1000 + 300 + CHANGE, true),
        (1000 + CHANGE - 1, 1000 + 300 + CHANGE - 1, false),
    ];
    for (departure_at_x, departure_at_y, valid) in cases {
        let (network, [s, _, _, t1, t2]) = change_network(departure_at_x, departure_at_y);
        let footpaths = FootpathHubIndex::empty(&network);
        let mut raptor = Raptor::new(&network, &footpaths, config());
        let arrivals = raptor.earliest_arrival(s, 0);
        let expected = if valid { 5000 } else { INFINITY };
        assert_eq!(arrivals[t1 as usize], expected, "change at X departing {departure_at_x}");
        assert_eq!(arrivals[t2 as usize], expected, "walk to Y departing {departure_at_y}");

        let profile = profile_pairs(&network, s, t1, 0, 2000);
        assert_eq!(profile, if valid { vec![(900, 5000)] } else { vec![] });
    }
}

#[test]
fn source_boarding_is_exempt_but_walking_away_is_not() {
    // Departing S at 900 boards at once; walking 300s to Y and boarding there needs the change time.
    let (network, [s, x, y, _, t2]) = change_network(3000, 1200 + CHANGE);
    let footpaths = FootpathHubIndex::empty(&network);
    let mut raptor = Raptor::new(&network, &footpaths, config());
    assert_eq!(raptor.earliest_arrival(s, 900)[x as usize], 1000);
    assert_eq!(raptor.earliest_arrival(x, 900)[t2 as usize], 5000);
    assert_eq!(raptor.earliest_arrival(x, 901)[t2 as usize], INFINITY);
    assert_eq!(raptor.earliest_arrival(y, 1200 + CHANGE)[t2 as usize], 5000);
}
