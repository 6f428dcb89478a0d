//! The Upsert Engine: applies one resolved batch to the Observation Store
//! and Lineage Store in a single transaction, with delete-then-reinsert
//! replace semantics. Rows are never partially updated.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::{RefineryError, Result};
use crate::models::{LineageRecord, ResolvedObservation};
use crate::resolver::duplicate_keys;
use crate::resolver::passes::ResolvedBatch;
use crate::store::RefineryStore;
use crate::utils::diagnostics;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub replaced: usize,
    pub lineage_written: usize,
}

impl UpsertOutcome {
    pub fn absorb(&mut self, other: UpsertOutcome) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.lineage_written += other.lineage_written;
    }
}

pub struct UpsertEngine<'a> {
    store: &'a mut RefineryStore,
    work_dir: PathBuf,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(store: &'a mut RefineryStore, work_dir: &Path) -> Self {
        Self {
            store,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Apply a batch. Existing keys keep their `load_batch_ts` and are
    /// replaced wholesale; new keys get both batch timestamps set to
    /// `run_ts`. A batch that itself contains duplicate keys is a resolver
    /// bug: it is dumped and rejected before anything is written.
    pub fn apply(&mut self, batch: &ResolvedBatch, run_ts: NaiveDateTime) -> Result<UpsertOutcome> {
        if batch.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let duplicates = duplicate_keys(&batch.observations);
        if !duplicates.is_empty() {
            let station_id = batch.observations[0].station_id.clone();
            let dump = diagnostics::dump_duplicates(
                &self.work_dir,
                &station_id,
                "upsert_batch",
                &batch.observations,
                &batch.lineage,
            )?;
            return Err(RefineryError::DuplicateKeysInBatch {
                station_id,
                count: duplicates.len(),
                dump,
            });
        }

        let tx = self.store.conn.transaction()?;
        let mut outcome = UpsertOutcome::default();
        for obs in &batch.observations {
            if replace_observation(&tx, obs, run_ts)? {
                outcome.replaced += 1;
            } else {
                outcome.inserted += 1;
            }
        }
        outcome.lineage_written = replace_lineage(&tx, &batch.lineage, run_ts)?;
        tx.commit()?;

        debug!(
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            lineage = outcome.lineage_written,
            "committed batch"
        );
        Ok(outcome)
    }
}

/// Delete-and-reinsert one canonical row. Returns true when an existing row
/// was replaced.
fn replace_observation(
    tx: &Transaction<'_>,
    obs: &ResolvedObservation,
    run_ts: NaiveDateTime,
) -> Result<bool> {
    let existing_load_ts: Option<NaiveDateTime> = tx
        .query_row(
            "SELECT load_batch_ts FROM dr_weather WHERE station_id = ?1 AND timestamp = ?2",
            params![obs.station_id, obs.timestamp],
            |row| row.get(0),
        )
        .optional()?;
    let replaced = existing_load_ts.is_some();
    let load_batch_ts = existing_load_ts.unwrap_or(run_ts);

    if replaced {
        tx.execute(
            "DELETE FROM dr_weather WHERE station_id = ?1 AND timestamp = ?2",
            params![obs.station_id, obs.timestamp],
        )?;
    }

    let m = &obs.measurements;
    tx.execute(
        "INSERT INTO dr_weather (
            station_id, timestamp, location, station_name,
            air_temp_f, second_air_temp_f, dew_point_f, rel_humidity_perc,
            leaf_wet_u, wind_dir, wind_speed_mph, wind_gust_mph,
            bed_temp_f, two_inch_soil_temp_f, eight_inch_soil_temp_f,
            soil_vwc_perc, total_precip_inch, solar_rad_watts_per_meter_squared,
            atm_pressure_in_hg, load_batch_ts, update_batch_ts
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            obs.station_id,
            obs.timestamp,
            obs.location,
            obs.station_name,
            m.air_temp_f,
            m.second_air_temp_f,
            m.dew_point_f,
            m.rel_humidity_perc,
            m.leaf_wet_u,
            m.wind_dir.map(|d| d.as_str()),
            m.wind_speed_mph,
            m.wind_gust_mph,
            m.bed_temp_f,
            m.two_inch_soil_temp_f,
            m.eight_inch_soil_temp_f,
            m.soil_vwc_perc,
            m.total_precip_inch,
            m.solar_rad_watts_per_meter_squared,
            m.atm_pressure_in_hg,
            load_batch_ts,
            run_ts,
        ],
    )?;
    Ok(replaced)
}

/// Replace the lineage of every target key present in the batch. Lineage
/// for a key is superseded, not appended, so reprocessing never accumulates
/// stale audit rows. `load_batch_ts` is preserved per target key.
fn replace_lineage(
    tx: &Transaction<'_>,
    lineage: &[LineageRecord],
    run_ts: NaiveDateTime,
) -> Result<usize> {
    let keys: BTreeSet<(String, NaiveDateTime)> =
        lineage.iter().map(LineageRecord::target_key).collect();

    let mut load_ts_by_key: HashMap<(String, NaiveDateTime), NaiveDateTime> = HashMap::new();
    for key in &keys {
        let existing: Option<NaiveDateTime> = tx.query_row(
            "SELECT MIN(load_batch_ts) FROM dr_lineage
             WHERE target_station_id = ?1 AND target_timestamp = ?2",
            params![key.0, key.1],
            |row| row.get(0),
        )?;
        load_ts_by_key.insert(key.clone(), existing.unwrap_or(run_ts));
        tx.execute(
            "DELETE FROM dr_lineage WHERE target_station_id = ?1 AND target_timestamp = ?2",
            params![key.0, key.1],
        )?;
    }

    for record in lineage {
        let load_batch_ts = load_ts_by_key[&record.target_key()];
        tx.execute(
            "INSERT INTO dr_lineage (
                source_filename, source_rownum, source_download_timestamp,
                source_load_timestamp, target_lineage_note, target_station_id,
                target_timestamp, load_batch_ts, update_batch_ts
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.provenance.source_filename,
                record.provenance.source_rownum,
                record.provenance.source_download_timestamp,
                record.provenance.source_load_timestamp,
                record.target_lineage_note,
                record.target_station_id,
                record.target_timestamp,
                load_batch_ts,
                run_ts,
            ],
        )?;
    }
    Ok(lineage.len())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Measurements, Observation, Provenance};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn observation(hour: u32, temp: f64) -> Observation {
        Observation {
            station_id: "330122".to_string(),
            timestamp: ts(1, hour),
            location: Some("Prosser".to_string()),
            station_name: Some("Roza".to_string()),
            measurements: Measurements {
                air_temp_f: Some(temp),
                ..Measurements::default()
            },
            provenance: Provenance {
                source_filename: "330122_2020.csv".to_string(),
                source_rownum: hour as i64 + 1,
                source_download_timestamp: ts(2, 0),
                source_load_timestamp: ts(2, 1),
            },
        }
    }

    fn batch_of(observations: Vec<Observation>) -> ResolvedBatch {
        ResolvedBatch {
            observations: observations.iter().map(Into::into).collect(),
            lineage: observations
                .iter()
                .map(|o| LineageRecord::for_observation(o, "test"))
                .collect(),
        }
    }

    #[test]
    fn insert_sets_both_batch_timestamps() {
        let dir = TempDir::new().unwrap();
        let mut store = RefineryStore::open(&dir.path().join("dr.db")).unwrap();
        let mut engine = UpsertEngine::new(&mut store, dir.path());

        let outcome = engine
            .apply(&batch_of(vec![observation(6, 40.0)]), ts(3, 0))
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.replaced, 0);

        let rows = store.fetch_observations().unwrap();
        assert_eq!(rows[0].load_batch_ts, ts(3, 0));
        assert_eq!(rows[0].update_batch_ts, ts(3, 0));
    }

    #[test]
    fn replace_preserves_load_ts_and_refreshes_update_ts() {
        let dir = TempDir::new().unwrap();
        let mut store = RefineryStore::open(&dir.path().join("dr.db")).unwrap();

        let mut engine = UpsertEngine::new(&mut store, dir.path());
        engine
            .apply(&batch_of(vec![observation(6, 40.0)]), ts(3, 0))
            .unwrap();
        let outcome = engine
            .apply(&batch_of(vec![observation(6, 43.0)]), ts(4, 0))
            .unwrap();
        assert_eq!(outcome.replaced, 1);

        let rows = store.fetch_observations().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resolved.measurements.air_temp_f, Some(43.0));
        assert_eq!(rows[0].load_batch_ts, ts(3, 0));
        assert_eq!(rows[0].update_batch_ts, ts(4, 0));

        let lineage = store.fetch_lineage().unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].load_batch_ts, ts(3, 0));
        assert_eq!(lineage[0].update_batch_ts, ts(4, 0));
    }

    #[test]
    fn lineage_for_a_key_is_superseded_not_appended() {
        let dir = TempDir::new().unwrap();
        let mut store = RefineryStore::open(&dir.path().join("dr.db")).unwrap();
        let mut engine = UpsertEngine::new(&mut store, dir.path());

        // Two raw rows contributed to the key on the first run.
        let mut second = observation(6, 40.0);
        second.provenance.source_rownum = 99;
        let first_run = ResolvedBatch {
            observations: vec![(&observation(6, 40.0)).into()],
            lineage: vec![
                LineageRecord::for_observation(&observation(6, 40.0), "a"),
                LineageRecord::for_observation(&second, "b"),
            ],
        };
        engine.apply(&first_run, ts(3, 0)).unwrap();
        engine
            .apply(&batch_of(vec![observation(6, 41.0)]), ts(4, 0))
            .unwrap();

        assert_eq!(store.lineage_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_keys_in_batch_fail_loudly_and_write_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = RefineryStore::open(&dir.path().join("dr.db")).unwrap();
        let mut engine = UpsertEngine::new(&mut store, dir.path());

        let bad = batch_of(vec![observation(6, 40.0), observation(6, 41.0)]);
        let err = engine.apply(&bad, ts(3, 0)).unwrap_err();
        assert!(matches!(err, RefineryError::DuplicateKeysInBatch { .. }));
        assert!(err.is_consistency_violation());

        assert_eq!(store.observation_count().unwrap(), 0);
        assert_eq!(store.lineage_count().unwrap(), 0);
        assert!(dir
            .path()
            .join("330122_upsert_batch_duplicates.csv")
            .exists());
    }
}
