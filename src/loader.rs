//! Reading timetables, hub labels and query batches from disk.
//!
//! Every table may be stored plain or gzip compressed (`name` or `name.gz`).
//! CSV tables have a header row and columns are located by name.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::builder::TimetableBuilder;
use crate::footpaths::{FootpathHubIndex, HubEntry};
use crate::network::{ConsistencyError, HubIndex, Network, StopIndex, StopTime, Timestamp};
use crate::utils;

pub const STOPS_FILE: &str = "stops.csv";
pub const STOP_TIMES_FILE: &str = "stop_times.csv";
pub const TRANSFERS_FILE: &str = "transfers.csv";
pub const IN_HUBS_FILE: &str = "walk_and_transfer_inhubs.gr";
pub const OUT_HUBS_FILE: &str = "walk_and_transfer_outhubs.gr";

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{}: missing column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{}:{line}: {message}", path.display())]
    Malformed { path: PathBuf, line: u64, message: String },
    #[error("{}: unknown {kind} '{id}'", path.display())]
    UnknownIdentifier { path: PathBuf, kind: &'static str, id: String },
    #[error("{}: {source}", path.display())]
    Gtfs { path: PathBuf, source: gtfs_structures::Error },
    #[error("inconsistent timetable: {0}")]
    Consistency(#[from] ConsistencyError),
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io { path: path.to_path_buf(), source }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        match source.kind() {
            csv::ErrorKind::Deserialize { pos, err } => LoadError::Malformed {
                path: path.to_path_buf(),
                line: pos.as_ref().map_or(0, csv::Position::line),
                message: err.to_string(),
            },
            _ => LoadError::Csv { path: path.to_path_buf(), source },
        }
    }
}

/// One profile query: travel from `source` to `target`, not before `departure_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub source: StopIndex,
    pub target: StopIndex,
    pub departure_time: Timestamp,
}

/// Opens a table for reading. `-` reads standard input, a `.gz` suffix is decompressed.
pub fn open_table(path: &Path) -> Result<Box<dyn Read>, LoadError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = File::open(path).map_err(|err| LoadError::io(path, err))?;
    if path.extension().is_some_and(|extension| extension == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// `dir/name` if it exists, otherwise `dir/name.gz` if that exists.
pub fn find_table(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Some(plain);
    }
    let compressed = dir.join(format!("{name}.gz"));
    compressed.is_file().then_some(compressed)
}

/// Parses integer seconds or `H:MM:SS`.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if s.contains(':') {
        utils::parse_time(s).ok()
    } else {
        s.parse().ok()
    }
}

fn deserialize_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{s}'")))
}

#[derive(Debug, Deserialize)]
struct StopRecord {
    stop_id: String,
    parent_station: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopTimeRecord {
    trip_id: String,
    stop_id: String,
    #[serde(alias = "sequence")]
    stop_sequence: u32,
    #[serde(deserialize_with = "deserialize_time")]
    arrival_time: Timestamp,
    #[serde(deserialize_with = "deserialize_time")]
    departure_time: Timestamp,
}

#[derive(Debug, Deserialize)]
struct TransferRecord {
    from_stop_id: String,
    to_stop_id: String,
    #[serde(alias = "duration")]
    min_transfer_time: Timestamp,
}

#[derive(Debug, Deserialize)]
struct QueryRecord {
    source: String,
    destination: String,
    #[serde(deserialize_with = "deserialize_time")]
    departure_time: Timestamp,
}

fn reader<R: Read>(stream: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(stream)
}

// Each required column is given as its accepted names, canonical name first.
fn read_table<T: DeserializeOwned>(path: &Path, columns: &[&[&'static str]]) -> Result<Vec<T>, LoadError> {
    let mut reader = reader(open_table(path)?);
    let headers = reader.headers().map_err(|err| LoadError::csv(path, err))?;
    for names in columns {
        if !headers.iter().any(|header| names.iter().any(|&name| name == header)) {
            return Err(LoadError::MissingColumn { path: path.to_path_buf(), column: names[0] });
        }
    }
    reader.deserialize().collect::<Result<_, _>>().map_err(|err| LoadError::csv(path, err))
}

fn read_stops(path: &Path, builder: &mut TimetableBuilder) -> Result<(), LoadError> {
    let records: Vec<StopRecord> = read_table(path, &[&["stop_id"]])?;
    for record in &records {
        builder.add_stop(&record.stop_id, record.parent_station.as_deref());
    }
    Ok(())
}

fn read_stop_times(path: &Path, builder: &mut TimetableBuilder) -> Result<(), LoadError> {
    let records: Vec<StopTimeRecord> = read_table(
        path,
        &[&["trip_id"], &["stop_id"], &["stop_sequence", "sequence"], &["arrival_time"], &["departure_time"]],
    )?;

    // Trips keep the order in which they first appear.
    let mut trip_index = HashMap::new();
    let mut trips: Vec<(&str, Vec<(u32, StopIndex, StopTime)>)> = Vec::new();
    for record in &records {
        let stop = builder.add_stop(&record.stop_id, None);
        let trip = *trip_index.entry(record.trip_id.as_str()).or_insert_with(|| {
            trips.push((record.trip_id.as_str(), Vec::new()));
            trips.len() - 1
        });
        trips[trip].1.push((record.stop_sequence, stop, StopTime::new(record.arrival_time, record.departure_time)));
    }

    for (trip_id, mut stop_times) in trips {
        stop_times.sort_by_key(|&(sequence, _, _)| sequence);
        builder.add_trip(trip_id, stop_times.into_iter().map(|(_, stop, time)| (stop, time)).collect());
    }
    Ok(())
}

fn read_transfers(path: &Path, builder: &mut TimetableBuilder) -> Result<(), LoadError> {
    let records: Vec<TransferRecord> =
        read_table(path, &[&["from_stop_id"], &["to_stop_id"], &["min_transfer_time", "duration"]])?;
    let mut skipped = 0;
    for record in &records {
        match (builder.get_stop_idx(&record.from_stop_id), builder.get_stop_idx(&record.to_stop_id)) {
            (Some(from), Some(to)) => builder.add_transfer(from, to, record.min_transfer_time),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {skipped} transfers between unknown stops.", path.display());
    }
    Ok(())
}

/// Loads `stops.csv` (optional), `stop_times.csv` and `transfers.csv`
/// (optional) from `dir`.
pub fn load_timetable(dir: &Path) -> Result<Network, LoadError> {
    let mut builder = TimetableBuilder::new();
    if let Some(path) = find_table(dir, STOPS_FILE) {
        read_stops(&path, &mut builder)?;
    }
    let stop_times =
        find_table(dir, STOP_TIMES_FILE).ok_or_else(|| not_found(&dir.join(STOP_TIMES_FILE)))?;
    read_stop_times(&stop_times, &mut builder)?;
    if let Some(path) = find_table(dir, TRANSFERS_FILE) {
        read_transfers(&path, &mut builder)?;
    }

    let network = builder.build()?;
    info!(
        "Loaded {} stops, {} routes and {} trips from {}.",
        network.num_stops(),
        network.num_routes(),
        network.total_trips(),
        dir.display()
    );
    Ok(network)
}

fn not_found(path: &Path) -> LoadError {
    LoadError::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "table not found"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HubDirection {
    // `stop hub weight`
    In,
    // `hub stop weight`
    Out,
}

fn read_hub_file(
    path: &Path,
    direction: HubDirection,
    network: &Network,
    hub_ids: &mut HashMap<String, HubIndex>,
) -> Result<Vec<HubEntry>, LoadError> {
    let mut entries = Vec::new();
    let mut seen_header = false;
    let mut skipped = 0usize;
    for (line_idx, line) in BufReader::new(open_table(path)?).lines().enumerate() {
        let line = line.map_err(|err| LoadError::io(path, err))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("c ") {
            continue;
        }
        // The first line holds counts, which are not needed.
        if !seen_header {
            seen_header = true;
            continue;
        }

        let malformed = |message: String| LoadError::Malformed {
            path: path.to_path_buf(),
            line: line_idx as u64 + 1,
            message,
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [first, second, weight] = fields[..] else {
            return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
        };
        let access_time: Timestamp = weight.parse().map_err(|_| malformed(format!("invalid weight '{weight}'")))?;
        let (stop_id, hub_id) = match direction {
            HubDirection::In => (first, second),
            HubDirection::Out => (second, first),
        };

        let Some(stop) = network.get_stop_idx(stop_id) else {
            skipped += 1;
            continue;
        };
        let next_hub = hub_ids.len() as HubIndex;
        let hub = *hub_ids.entry(hub_id.to_string()).or_insert(next_hub);
        entries.push(HubEntry { stop, hub, access_time });
    }
    if skipped > 0 {
        warn!("{}: skipped {skipped} hub labels naming stops unknown to the timetable.", path.display());
    }
    debug!("{}: {} hub labels.", path.display(), entries.len());
    Ok(entries)
}

/// Builds the footpath index from the hub files in `dir`. Missing hub files
/// leave only the network's direct transfers.
pub fn load_footpaths(dir: &Path, network: &Network) -> Result<FootpathHubIndex, LoadError> {
    let mut hub_ids = HashMap::new();
    let mut read = |name: &str, direction| match find_table(dir, name) {
        Some(path) => read_hub_file(&path, direction, network, &mut hub_ids),
        None => Ok(Vec::new()),
    };
    let in_hubs = read(IN_HUBS_FILE, HubDirection::In)?;
    let out_hubs = read(OUT_HUBS_FILE, HubDirection::Out)?;

    let footpaths = FootpathHubIndex::new(network, &in_hubs, &out_hubs)?;
    info!("Loaded {} hubs with {} in-labels and {} out-labels.", footpaths.num_hubs(), in_hubs.len(), out_hubs.len());
    Ok(footpaths)
}

/// Reads at most `max_queries` queries. Ids name stops, or stations, which
/// stand for their first stop. Unknown ids are an error.
pub fn load_queries(path: &Path, network: &Network, max_queries: usize) -> Result<Vec<Query>, LoadError> {
    let records: Vec<QueryRecord> = read_table(path, &[&["source"], &["destination"], &["departure_time"]])?;
    let stop_idx = |id: &str| {
        network
            .get_stop_idx(id)
            .or_else(|| {
                let station = network.get_station_idx(id)?;
                network.stops_of_station(station).first().copied()
            })
            .ok_or_else(|| LoadError::UnknownIdentifier {
                path: path.to_path_buf(),
                kind: "stop",
                id: id.to_string(),
            })
    };
    records
        .iter()
        .take(max_queries)
        .map(|record| {
            Ok(Query {
                source: stop_idx(&record.source)?,
                target: stop_idx(&record.destination)?,
                departure_time: record.departure_time,
            })
        })
        .collect()
}
