use std::path::Path;

use chrono::NaiveDate;
use gtfs_structures::{Gtfs, GtfsReader, Trip};
use log::{info, warn};

use crate::builder::TimetableBuilder;
use crate::loader::LoadError;
use crate::network::{Network, StopTime, Timestamp};
use crate::utils;

/// Builds a network from the trips of `gtfs` that run on `journey_date`.
///
/// Stops are identified by their GTFS `stop_id` and grouped into stations by
/// `parent_station`. Transfers with a `min_transfer_time` become direct
/// transfers; other transfer rules are ignored.
pub fn network_from_gtfs(gtfs: &Gtfs, journey_date: NaiveDate) -> Result<Network, LoadError> {
    let mut builder = TimetableBuilder::new();

    // Only consider trips that run on the given date. Sorting keeps route ids stable between runs.
    let mut trips: Vec<&Trip> = gtfs.trips.values().filter(|trip| utils::does_trip_run(gtfs, trip, journey_date)).collect();
    trips.sort_unstable_by(|a, b| a.id.cmp(&b.id));

    let mut untimed_trips = 0;
    for trip in trips {
        let stop_times = trip
            .stop_times
            .iter()
            .map(|stop_time| {
                let stop = builder.add_stop(&stop_time.stop.id, stop_time.stop.parent_station.as_deref());
                let arrival_time = stop_time.arrival_time.or(stop_time.departure_time)?;
                let departure_time = stop_time.departure_time.or(stop_time.arrival_time)?;
                let stop_time = StopTime::new(
                    Timestamp::try_from(arrival_time).ok()?,
                    Timestamp::try_from(departure_time).ok()?,
                );
                Some((stop, stop_time))
            })
            .collect::<Option<Vec<_>>>();
        match stop_times {
            Some(stop_times) => builder.add_trip(&trip.id, stop_times),
            None => untimed_trips += 1,
        }
    }
    if untimed_trips > 0 {
        warn!("Skipped {untimed_trips} trips with untimed stops.");
    }

    for stop in gtfs.stops.values() {
        let Some(from) = builder.get_stop_idx(&stop.id) else { continue };
        for transfer in &stop.transfers {
            let (Some(to), Some(duration)) = (builder.get_stop_idx(&transfer.to_stop_id), transfer.min_transfer_time)
            else {
                continue;
            };
            if let Ok(duration) = Timestamp::try_from(duration) {
                builder.add_transfer(from, to, duration);
            }
        }
    }

    Ok(builder.build()?)
}

/// Reads a GTFS feed (zip archive or directory) and builds the network for `journey_date`.
pub fn load_gtfs(path: &Path, journey_date: NaiveDate) -> Result<Network, LoadError> {
    let gtfs = GtfsReader::default()
        .read_shapes(false)
        .read(&path.to_string_lossy())
        .map_err(|source| LoadError::Gtfs { path: path.to_path_buf(), source })?;
    info!(
        "GTFS loaded with {} stops, {} routes, and {} trips.",
        gtfs.stops.len(),
        gtfs.routes.len(),
        gtfs.trips.len()
    );

    let network = network_from_gtfs(&gtfs, journey_date)?;
    info!(
        "Network for {journey_date} has {} stops, {} routes and {} trips.",
        network.num_stops(),
        network.num_routes(),
        network.total_trips()
    );
    Ok(network)
}
