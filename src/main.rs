use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Parser;
use log::{debug, error, info};
use rayon::prelude::*;

use raptor::loader::{self, parse_timestamp};
use raptor::network::Timestamp;
use raptor::{gtfs, FootpathHubIndex, Network, ParetoFront, Profile, ProfileConfig, RaptorConfig};

// Queries solved between two writes of the output file.
const QUERIES_PER_BATCH: usize = 256;

#[derive(Parser, Debug)]
#[command(version, about = "Computes Pareto-optimal departure/arrival profiles for a batch of transit queries")]
struct Cli {
    #[arg(help = "Directory with the timetable tables, or a GTFS feed when --gtfs-date is given.")]
    dir: PathBuf,

    #[arg(
        long,
        default_value = "queries-unif.csv",
        help = "Query table with source, destination and departure_time columns, relative to DIR."
    )]
    query_file: PathBuf,

    #[arg(long, default_value_t = 60, help = "Minimum time in seconds between alighting and boarding.")]
    min_change_time: Timestamp,

    #[arg(long, default_value_t = 10000, help = "Maximum number of queries to read.")]
    nq: usize,

    #[arg(long, default_value = "0", value_parser = parse_time_arg, help = "Start of the departure window.")]
    beg: Timestamp,

    #[arg(long, value_parser = parse_time_arg, help = "End of the departure window [default: latest time in the timetable].")]
    end: Option<Timestamp>,

    #[arg(long, help = "Maximum number of trips per journey.")]
    max_rounds: Option<usize>,

    #[arg(long, help = "Disable pruning with the reversed timetable.")]
    no_pruning: bool,

    #[arg(long, value_parser = parse_date, help = "Read DIR as a GTFS feed and use the trips running on this date (YYYY-MM-DD).")]
    gtfs_date: Option<NaiveDate>,

    #[arg(short = 'o', long, default_value = "raptor.csv", help = "The file to write the profiles to.")]
    output: PathBuf,
}

fn parse_time_arg(s: &str) -> Result<Timestamp, String> {
    parse_timestamp(s).ok_or_else(|| format!("invalid time '{s}', expected seconds or H:MM:SS"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|err| err.to_string())
}

fn load(cli: &Cli) -> Result<(Network, FootpathHubIndex), Box<dyn Error>> {
    match cli.gtfs_date {
        Some(date) => {
            let network = gtfs::load_gtfs(&cli.dir, date)?;
            let footpaths = FootpathHubIndex::empty(&network);
            Ok((network, footpaths))
        }
        None => {
            let network = loader::load_timetable(&cli.dir)?;
            let footpaths = loader::load_footpaths(&cli.dir, &network)?;
            Ok((network, footpaths))
        }
    }
}

fn query_path(cli: &Cli) -> PathBuf {
    if cli.dir.is_dir() && cli.query_file.is_relative() && cli.query_file != Path::new("-") {
        cli.dir.join(&cli.query_file)
    } else {
        cli.query_file.clone()
    }
}

fn create_output(path: &Path) -> Result<csv::Writer<File>, Box<dyn Error>> {
    let file = File::create(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["query", "arrival", "departure"])?;
    Ok(writer)
}

fn write_profiles(writer: &mut csv::Writer<File>, fronts: &[(usize, ParetoFront)]) -> Result<(), Box<dyn Error>> {
    for (query_idx, front) in fronts {
        // Stored latest departure first.
        for label in front.iter().rev() {
            writer.serialize((query_idx, label.arrival, label.departure))?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(end) = cli.end.filter(|&end| end < cli.beg) {
        return Err(format!("--end ({end}) is before --beg ({})", cli.beg).into());
    }
    let mut writer = create_output(&cli.output)?;

    let timer = Instant::now();
    let (network, footpaths) = load(cli)?;
    network.print_stats();
    let reversed_network = network.reverse();
    let reversed_footpaths = footpaths.reverse();
    info!("Timetable ready in {:?}.", timer.elapsed());

    let queries = loader::load_queries(&query_path(cli), &network, cli.nq)?;
    let t_beg = cli.beg;
    let t_end = cli.end.unwrap_or(network.t_max()).max(t_beg);
    let queries: Vec<_> =
        queries.into_iter().enumerate().filter(|(_, query)| query.departure_time >= t_beg).collect();
    info!("Running {} queries over [{t_beg}, {t_end}).", queries.len());

    let raptor_config = RaptorConfig { min_change_time: cli.min_change_time, max_rounds: cli.max_rounds };
    let profile_config = ProfileConfig { pruning: !cli.no_pruning };
    let timer = Instant::now();
    let mut num_trips = 0;
    for batch in queries.chunks(QUERIES_PER_BATCH) {
        let fronts: Vec<(usize, ParetoFront)> = batch
            .par_iter()
            .map_init(
                || Profile::new(&network, &footpaths, &reversed_network, &reversed_footpaths, raptor_config, profile_config),
                |profile, &(query_idx, query)| {
                    let front = profile.profile(query.source, query.target, t_beg, t_end);
                    debug!("Query {query_idx}: {} -> {}: {} trips.", query.source, query.target, front.len());
                    (query_idx, front)
                },
            )
            .collect();
        num_trips += fronts.iter().map(|(_, front)| front.len()).sum::<usize>();
        write_profiles(&mut writer, &fronts)?;
    }
    let elapsed = timer.elapsed();

    let num_queries = queries.len().max(1);
    info!(
        "{} profile queries done in {elapsed:?} ({:?} per query), avg_ntrips = {:.2}.",
        queries.len(),
        elapsed / num_queries as u32,
        num_trips as f64 / num_queries as f64
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
