use chrono::NaiveDate;
use gtfs_structures::{Exception, Gtfs, Trip};

use crate::network::Timestamp;

// A fast way to check a buffer is all zeros (https://stackoverflow.com/questions/65367552/how-to-efficiently-check-a-vecu8-to-see-if-its-all-zeros).
pub fn is_zero(buf: &[bool]) -> bool {
    let (prefix, aligned, suffix) = unsafe { buf.align_to::<u128>() };

    prefix.iter().all(|&x| !x) && aligned.iter().all(|&x| x == 0) && suffix.iter().all(|&x| !x)
}

/// Whether the trip's service runs on `date`. Calendar date exceptions take
/// precedence over the weekly calendar.
pub fn does_trip_run(gtfs: &Gtfs, trip: &Trip, date: NaiveDate) -> bool {
    let service_id = trip.service_id.as_str();
    let exception = gtfs
        .calendar_dates
        .get(service_id)
        .and_then(|calendar_dates| calendar_dates.iter().find(|calendar_date| calendar_date.date == date));
    if let Some(exception) = exception {
        return matches!(exception.exception_type, Exception::Added);
    }
    gtfs.calendar
        .get(service_id)
        .is_some_and(|calendar| calendar.valid_weekday(date) && calendar.start_date <= date && date <= calendar.end_date)
}

// Copied from gtfs_structures::serde_helpers, which are private :(
// Returns `None` on malformed fields and on overflow.
fn parse_time_impl(h: &str, m: &str, s: &str) -> Option<Timestamp> {
    let hours: Timestamp = h.parse().ok()?;
    let minutes: Timestamp = m.parse().ok()?;
    let seconds: Timestamp = s.parse().ok()?;
    hours.checked_mul(3600)?.checked_add(minutes * 60)?.checked_add(seconds)
}

/// Parses `H:MM:SS` (hours may exceed 23) into seconds.
pub fn parse_time(s: &str) -> Result<Timestamp, gtfs_structures::Error> {
    if s.len() < 7 {
        Err(gtfs_structures::Error::InvalidTime(s.to_owned()))
    } else {
        let parts: Vec<&str> = s.split(':').collect();

        if parts.len() != 3 {
            return Err(gtfs_structures::Error::InvalidTime(s.to_owned()));
        }

        let sec = parts[2];
        let min = parts[1];
        let hour = parts[0];

        if min.len() != 2 || sec.len() != 2 || hour.starts_with(['-', '+']) {
            return Err(gtfs_structures::Error::InvalidTime(s.to_owned()));
        }

        parse_time_impl(hour, min, sec).ok_or_else(|| gtfs_structures::Error::InvalidTime(s.to_owned()))
    }
}

pub fn get_time_str(time: Timestamp) -> String {
    let sign = if time < 0 { "-" } else { "" };
    let time = (time as i64).abs();
    let hours = time / 3600;
    let minutes = (time % 3600) / 60;
    let seconds = time % 60;
    format!("{sign}{:02}:{:02}:{:02}", hours, minutes, seconds)
}
