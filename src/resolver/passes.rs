//! The three-pass conflict resolution over one station's working set.
//!
//! Pass 1 passes unique (station_id, timestamp) keys straight through.
//! Pass 2 collapses bit-identical duplicates and passes keys that reduce to
//! a single data row. Pass 3 resolves the genuinely conflicting keys column
//! by column, with wind direction and speed handled jointly.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::models::{
    DataKey, LineageRecord, ObsKey, Observation, ResolvedObservation, VOTED_COLUMNS,
};

pub const NOTE_STRAIGHT_COPY: &str = "Non duplicated row, straight copy";
pub const NOTE_KEY_DUPLICATE: &str = "More than one row per station_id, timestamp";

/// Output of one resolution pass: canonical rows plus one lineage record per
/// raw input that contributed to them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBatch {
    pub observations: Vec<ResolvedObservation>,
    pub lineage: Vec<LineageRecord>,
}

impl ResolvedBatch {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.lineage.is_empty()
    }
}

/// Split the working set by key cardinality: rows whose key occurs exactly
/// once go to Pass 1, the rest to Passes 2 and 3.
pub fn partition_by_key(observations: Vec<Observation>) -> (Vec<Observation>, Vec<Observation>) {
    let mut counts: HashMap<ObsKey, usize> = HashMap::new();
    for obs in &observations {
        *counts.entry(obs.key()).or_default() += 1;
    }
    let (singles, duplicates): (Vec<_>, Vec<_>) = observations
        .into_iter()
        .partition(|obs| counts[&obs.key()] == 1);
    info!(
        singles = singles.len(),
        duplicates = duplicates.len(),
        "partitioned working set by key cardinality"
    );
    (singles, duplicates)
}

/// Pass 1: unique keys are straight copies.
pub fn resolve_singles(singles: Vec<Observation>) -> ResolvedBatch {
    let lineage = singles
        .iter()
        .map(|obs| LineageRecord::for_observation(obs, NOTE_STRAIGHT_COPY))
        .collect();
    let observations = singles.iter().map(ResolvedObservation::from).collect();
    ResolvedBatch {
        observations,
        lineage,
    }
}

/// Pass 2: suppress bit-identical data rows among the duplicated keys. Keys
/// that reduce to exactly one distinct data row pass through; every raw row
/// of a passed key still gets its own lineage record. Rows of keys that
/// remain conflicted are returned for Pass 3.
pub fn collapse_identical(duplicates: Vec<Observation>) -> (ResolvedBatch, Vec<Observation>) {
    let mut seen: HashSet<DataKey> = HashSet::new();
    let mut distinct: Vec<&Observation> = Vec::new();
    for obs in &duplicates {
        if seen.insert(obs.data_key()) {
            distinct.push(obs);
        }
    }

    let mut counts: HashMap<ObsKey, usize> = HashMap::new();
    for obs in &distinct {
        *counts.entry(obs.key()).or_default() += 1;
    }

    let observations: Vec<ResolvedObservation> = distinct
        .iter()
        .filter(|obs| counts[&obs.key()] == 1)
        .map(|obs| ResolvedObservation::from(*obs))
        .collect();
    let passed_keys: HashSet<ObsKey> = observations.iter().map(|obs| obs.key()).collect();

    let lineage = duplicates
        .iter()
        .filter(|obs| passed_keys.contains(&obs.key()))
        .map(|obs| LineageRecord::for_observation(obs, NOTE_KEY_DUPLICATE))
        .collect();
    let remaining: Vec<Observation> = duplicates
        .into_iter()
        .filter(|obs| !passed_keys.contains(&obs.key()))
        .collect();

    info!(
        passed_keys = passed_keys.len(),
        conflicted_rows = remaining.len(),
        "collapsed data-identical duplicates"
    );
    (
        ResolvedBatch {
            observations,
            lineage,
        },
        remaining,
    )
}

/// Pass 3: resolve one conflicted key column by column.
///
/// Per column: a single non-null value wins; more than one non-null value
/// all within ±10% of their mean resolves to the mean; anything else is
/// nulled. Wind direction and speed are resolved jointly over the rows that
/// carry a direction. The accumulated note explains every decision.
///
/// The decisions are applied to every row of the key and the rows then
/// deduplicated; callers must treat more than one surviving row as a fatal
/// internal-consistency error.
pub fn resolve_conflicts(rows: &[Observation]) -> (Vec<ResolvedObservation>, String) {
    let mut note = String::from("column by column: ");
    let mut decisions: Vec<(usize, Option<f64>)> = Vec::with_capacity(VOTED_COLUMNS.len());

    for (idx, col) in VOTED_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|r| (col.get)(&r.measurements))
            .collect();
        let resolved = if values.len() == 1 {
            note.push_str(&format!(", found single non-null in {}", col.name));
            Some(values[0])
        } else {
            let (mean, all_in_band) = mean_and_band_check(&values);
            if values.len() > 1 && all_in_band {
                note.push_str(&format!(", mean used for {}", col.name));
                Some(mean)
            } else {
                note.push_str(&format!(", null filled in for {}", col.name));
                None
            }
        };
        decisions.push((idx, resolved));
    }

    // Wind: only rows that carry a direction participate. One agreed
    // direction with every speed present and inside the band keeps the
    // pair. A direction-bearing row without a speed fails the band check
    // like any out-of-band value and nulls both columns.
    let dir_rows: Vec<&Observation> = rows
        .iter()
        .filter(|r| r.measurements.wind_dir.is_some())
        .collect();
    let directions: HashSet<_> = dir_rows
        .iter()
        .filter_map(|r| r.measurements.wind_dir)
        .collect();
    let speeds: Vec<f64> = dir_rows
        .iter()
        .filter_map(|r| r.measurements.wind_speed_mph)
        .collect();
    let (speed_mean, speeds_in_band) = mean_and_band_check(&speeds);
    let (wind_dir, wind_speed) =
        if directions.len() == 1 && speeds.len() == dir_rows.len() && speeds_in_band {
            note.push_str(", mean used for wind_speed_mph");
            (directions.into_iter().next(), Some(speed_mean))
        } else {
            note.push_str(", null filled in for wind_dir and wind_speed_mph");
            (None, None)
        };

    let mut resolved_rows: Vec<ResolvedObservation> = Vec::new();
    let mut seen: HashSet<DataKey> = HashSet::new();
    for row in rows {
        let mut row = row.clone();
        for (idx, value) in &decisions {
            (VOTED_COLUMNS[*idx].set)(&mut row.measurements, *value);
        }
        row.measurements.wind_dir = wind_dir;
        row.measurements.wind_speed_mph = wind_speed;
        if seen.insert(row.data_key()) {
            resolved_rows.push(ResolvedObservation::from(&row));
        }
    }

    debug!(key_rows = rows.len(), note = %note, "resolved conflicted key");
    (resolved_rows, note)
}

/// Arithmetic mean plus the ±10% band check. Both band edges scale with the
/// absolute value of the mean, so the band is symmetric around it. An empty
/// slice is vacuously in band.
fn mean_and_band_check(values: &[f64]) -> (f64, bool) {
    if values.is_empty() {
        return (f64::NAN, true);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let lower = mean - 0.1 * mean.abs();
    let upper = mean + 0.1 * mean.abs();
    let all_in_band = values.iter().all(|v| (lower..=upper).contains(v));
    (mean, all_in_band)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{CompassPoint, Measurements, Provenance};

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn obs(hour: u32, rownum: i64, measurements: Measurements) -> Observation {
        Observation {
            station_id: "330122".to_string(),
            timestamp: ts(hour),
            location: Some("Prosser".to_string()),
            station_name: Some("Roza".to_string()),
            measurements,
            provenance: Provenance {
                source_filename: "330122_2020.csv".to_string(),
                source_rownum: rownum,
                source_download_timestamp: ts(12),
                source_load_timestamp: ts(12),
            },
        }
    }

    fn air(rownum: i64, hour: u32, temp: Option<f64>) -> Observation {
        obs(
            hour,
            rownum,
            Measurements {
                air_temp_f: temp,
                ..Measurements::default()
            },
        )
    }

    fn wind(rownum: i64, dir: Option<CompassPoint>, speed: Option<f64>) -> Observation {
        obs(
            6,
            rownum,
            Measurements {
                wind_dir: dir,
                wind_speed_mph: speed,
                ..Measurements::default()
            },
        )
    }

    #[test]
    fn partition_separates_unique_keys() {
        let rows = vec![
            air(1, 0, Some(40.0)),
            air(2, 1, Some(41.0)),
            air(3, 1, Some(42.0)),
        ];
        let (singles, duplicates) = partition_by_key(rows);
        assert_eq!(singles.len(), 1);
        assert_eq!(duplicates.len(), 2);
        assert_eq!(singles[0].timestamp, ts(0));
    }

    #[test]
    fn singles_pass_through_with_straight_copy_note() {
        let batch = resolve_singles(vec![air(1, 0, Some(40.0))]);
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.observations[0].measurements.air_temp_f, Some(40.0));
        assert_eq!(batch.lineage.len(), 1);
        assert_eq!(batch.lineage[0].target_lineage_note, NOTE_STRAIGHT_COPY);
    }

    #[test]
    fn identical_duplicates_collapse_with_full_lineage() {
        // Two bit-identical data rows from different source lines.
        let mut second = air(2, 6, Some(40.0));
        second.provenance.source_rownum = 2;
        let (batch, remaining) = collapse_identical(vec![air(1, 6, Some(40.0)), second]);

        assert!(remaining.is_empty());
        assert_eq!(batch.observations.len(), 1);
        // Both raw rows keep their own lineage record.
        assert_eq!(batch.lineage.len(), 2);
        assert!(batch
            .lineage
            .iter()
            .all(|l| l.target_lineage_note == NOTE_KEY_DUPLICATE));
    }

    #[test]
    fn conflicting_duplicates_are_left_for_pass_three() {
        let (batch, remaining) =
            collapse_identical(vec![air(1, 6, Some(40.0)), air(2, 6, Some(52.0))]);
        assert!(batch.is_empty());
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn values_within_band_resolve_to_mean() {
        let rows = vec![
            air(1, 6, Some(10.0)),
            air(2, 6, Some(10.5)),
            air(3, 6, Some(10.9)),
        ];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved.len(), 1);
        let got = resolved[0].measurements.air_temp_f.unwrap();
        assert!((got - 10.466_666_666_666_667).abs() < 1e-12);
        assert!(note.contains("mean used for air_temp_f"));
    }

    #[test]
    fn values_outside_band_resolve_to_null() {
        let rows = vec![air(1, 6, Some(10.0)), air(2, 6, Some(50.0))];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].measurements.air_temp_f, None);
        assert!(note.contains("null filled in for air_temp_f"));
    }

    #[test]
    fn single_non_null_value_wins() {
        let rows = vec![air(1, 6, None), air(2, 6, None), air(3, 6, Some(7.2))];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.air_temp_f, Some(7.2));
        assert!(note.contains("found single non-null in air_temp_f"));
    }

    #[test]
    fn agreeing_wind_directions_average_the_speed() {
        let rows = vec![
            wind(1, Some(CompassPoint::N), Some(5.0)),
            wind(2, Some(CompassPoint::N), Some(5.2)),
        ];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, Some(CompassPoint::N));
        let speed = resolved[0].measurements.wind_speed_mph.unwrap();
        assert!((speed - 5.1).abs() < 1e-12);
        assert!(note.contains("mean used for wind_speed_mph"));
    }

    #[test]
    fn disagreeing_wind_directions_null_the_pair() {
        let rows = vec![
            wind(1, Some(CompassPoint::N), Some(5.0)),
            wind(2, Some(CompassPoint::S), Some(5.0)),
        ];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, None);
        assert_eq!(resolved[0].measurements.wind_speed_mph, None);
        assert!(note.contains("null filled in for wind_dir and wind_speed_mph"));
    }

    #[test]
    fn directionless_rows_do_not_vote_on_wind() {
        let rows = vec![
            wind(1, Some(CompassPoint::NW), Some(4.0)),
            wind(2, None, Some(400.0)),
        ];
        let (resolved, _) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, Some(CompassPoint::NW));
        assert_eq!(resolved[0].measurements.wind_speed_mph, Some(4.0));
    }

    #[test]
    fn missing_speed_on_a_direction_row_nulls_the_pair() {
        let rows = vec![
            wind(1, Some(CompassPoint::N), Some(5.0)),
            wind(2, Some(CompassPoint::N), None),
        ];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, None);
        assert_eq!(resolved[0].measurements.wind_speed_mph, None);
        assert!(note.contains("null filled in for wind_dir and wind_speed_mph"));
    }

    #[test]
    fn lone_direction_without_a_speed_nulls_the_pair() {
        let rows = vec![
            wind(1, Some(CompassPoint::N), None),
            wind(2, None, Some(7.0)),
        ];
        let (resolved, note) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, None);
        assert_eq!(resolved[0].measurements.wind_speed_mph, None);
        assert!(note.contains("null filled in for wind_dir and wind_speed_mph"));
    }

    #[test]
    fn speeds_outside_band_null_the_pair_even_with_one_direction() {
        let rows = vec![
            wind(1, Some(CompassPoint::N), Some(5.0)),
            wind(2, Some(CompassPoint::N), Some(9.0)),
        ];
        let (resolved, _) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.wind_dir, None);
        assert_eq!(resolved[0].measurements.wind_speed_mph, None);
    }

    #[test]
    fn band_is_symmetric_for_negative_means() {
        // Mean -10.0, band [-11.0, -9.0].
        let rows = vec![air(1, 6, Some(-9.5)), air(2, 6, Some(-10.5))];
        let (resolved, _) = resolve_conflicts(&rows);
        assert_eq!(resolved[0].measurements.air_temp_f, Some(-10.0));
    }

    #[test]
    fn divergent_station_names_survive_as_residual_rows() {
        // Identity reset failed upstream: same key, different station_name.
        // Resolution cannot collapse these, and the caller must abort.
        let mut a = air(1, 6, Some(40.0));
        let mut b = air(2, 6, Some(41.0));
        a.station_name = Some("Roza".to_string());
        b.station_name = Some("Roza West".to_string());
        let (resolved, _) = resolve_conflicts(&[a, b]);
        assert_eq!(resolved.len(), 2);
    }
}
