//! Pre-resolution normalization: timestamp derivation, wind splitting, and
//! the data-quality rules applied once before any partitioning.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use crate::models::{CompassPoint, DataKey, Observation, Provenance, RawObservation};

/// Twice the highest wind speed ever recorded (322 mph). Anything above it
/// is an instrument fault, not weather.
pub const MAX_CREDIBLE_WIND_MPH: f64 = 644.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SourceZone {
    Pdt,
    Pst,
}

/// Reset station_name and location uniformly to the last-loaded non-null
/// value. Stations get renamed over the years; the canonical rows should not
/// flip-flop between spellings.
pub fn reset_station_identity(rows: &mut [RawObservation]) {
    let name = rows.iter().rev().find_map(|r| r.station_name.clone());
    let location = rows.iter().rev().find_map(|r| r.location.clone());
    if let Some(ref n) = name {
        info!(station_name = %n, "resetting station name across raw rows");
    }
    for row in rows.iter_mut() {
        row.station_name = name.clone();
        row.location = location.clone();
    }
}

/// Turn raw lake rows into resolver working records: derive the timestamp,
/// split the combined wind field, and suppress exact duplicates. Rows whose
/// timestamp cannot be derived are dropped and produce no lineage.
pub fn derive_observations(rows: Vec<RawObservation>) -> Vec<Observation> {
    let total = rows.len();
    let mut seen: HashSet<(DataKey, Provenance)> = HashSet::new();
    let mut derived = Vec::with_capacity(total);

    for row in rows {
        if row.station_id.trim().is_empty() {
            continue;
        }
        let Some(timestamp) = derive_timestamp(&row) else {
            debug!(
                source = %row.provenance.source_filename,
                rownum = row.provenance.source_rownum,
                "dropping row with underivable timestamp"
            );
            continue;
        };

        let mut measurements = row.measurements;
        let (wind_dir, wind_speed_mph) = match row.wind_dir_at_speed_mph.as_deref() {
            Some(raw) => split_wind(raw),
            None => (None, None),
        };
        measurements.wind_dir = wind_dir;
        measurements.wind_speed_mph = wind_speed_mph;

        let obs = Observation {
            station_id: row.station_id,
            timestamp,
            location: row.location,
            station_name: row.station_name,
            measurements,
            provenance: row.provenance,
        };

        // Exact duplicates (same data, same provenance) add nothing.
        let identity = (obs.data_key(), obs.provenance.clone());
        if seen.insert(identity) {
            derived.push(obs);
        }
    }

    info!(
        raw_rows = total,
        derived_rows = derived.len(),
        "derived timestamps for raw rows"
    );
    derived
}

/// Sanity rules applied once, before partitioning:
/// - wind speed/gust above the credibility ceiling become null,
/// - relative humidity of exactly zero is a sensor fault,
/// - precipitation/solar readings alongside a full sensor outage are nulled.
pub fn apply_quality_rules(observations: &mut [Observation]) {
    for obs in observations.iter_mut() {
        let m = &mut obs.measurements;
        if matches!(m.wind_gust_mph, Some(v) if v > MAX_CREDIBLE_WIND_MPH) {
            m.wind_gust_mph = None;
        }
        if matches!(m.wind_speed_mph, Some(v) if v > MAX_CREDIBLE_WIND_MPH) {
            m.wind_speed_mph = None;
        }
        if m.rel_humidity_perc == Some(0.0) {
            m.rel_humidity_perc = None;
        }
        if m.is_outage_apart_from_precip_and_solar() {
            m.total_precip_inch = None;
            m.solar_rad_watts_per_meter_squared = None;
        }
    }
}

/// Derive a uniform-PST timestamp from the raw date/time strings. Exactly
/// one of the PDT/PST time columns must be populated; a `24:00` hour rolls
/// the date forward one day and becomes `00:00`; PDT readings shift back an
/// hour.
fn derive_timestamp(row: &RawObservation) -> Option<NaiveDateTime> {
    let (time, zone) = match (row.time_pdt.as_deref(), row.time_pst.as_deref()) {
        (Some(t), None) => (t, SourceZone::Pdt),
        (None, Some(t)) => (t, SourceZone::Pst),
        _ => return None,
    };
    let date_str = row.date.as_deref()?;
    let mut date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()?;

    let time = time.trim();
    let time = if time == "24:00" {
        date = date.succ_opt()?;
        "00:00"
    } else {
        time
    };
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;

    let mut timestamp = date.and_time(time);
    if zone == SourceZone::Pdt {
        timestamp -= Duration::hours(1);
    }
    Some(timestamp)
}

/// Split the lake's combined `DIR@SPEED` wind field. A direction that is
/// not one of the 16 compass points invalidates the speed as well.
fn split_wind(raw: &str) -> (Option<CompassPoint>, Option<f64>) {
    let (dir_part, speed_part) = match raw.split_once('@') {
        Some((dir, speed)) => (dir, Some(speed)),
        None => (raw, None),
    };
    match CompassPoint::parse(dir_part) {
        Some(dir) => {
            let speed = speed_part.and_then(|s| s.trim().parse::<f64>().ok());
            (Some(dir), speed)
        }
        None => (None, None),
    }
}
