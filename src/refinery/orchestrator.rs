//! The refinement run: roster in, one refined database per station out.
//!
//! Stations are independent. A failure that only concerns one station's
//! input data is logged and the run moves on; a consistency violation means
//! the resolver or the store state cannot be trusted and aborts the whole
//! run.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::RefineryConfig;
use crate::error::{RefineryError, Result};
use crate::models::{LineageRecord, ObsKey, Observation};
use crate::readers::{read_roster, read_station_lake};
use crate::resolver::{
    apply_quality_rules, collapse_identical, derive_observations, duplicate_keys,
    partition_by_key, reset_station_identity, resolve_conflicts, resolve_singles, ResolvedBatch,
};
use crate::store::{RefineryStore, UpsertEngine, UpsertOutcome};
use crate::utils::{diagnostics, ProgressReporter};

/// Counters for one station's refinement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StationSummary {
    pub station_id: String,
    pub raw_rows: usize,
    pub working_rows: usize,
    pub already_committed: usize,
    pub straight_copies: usize,
    pub collapsed_duplicates: usize,
    pub conflicted_keys: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub lineage_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationFailure {
    pub station_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_ts: NaiveDateTime,
    pub stations: Vec<StationSummary>,
    pub failures: Vec<StationFailure>,
}

impl RunSummary {
    pub fn total_written(&self) -> usize {
        self.stations.iter().map(|s| s.inserted + s.replaced).sum()
    }
}

pub struct Refinery {
    config: RefineryConfig,
}

impl Refinery {
    pub fn new(config: RefineryConfig) -> Self {
        Self { config }
    }

    /// Refine every station on the roster, or just `only` when given.
    ///
    /// Per-station data problems are recorded and skipped. A consistency
    /// violation aborts immediately: its diagnostics are already on disk
    /// and continuing would refine other stations against a run that needs
    /// investigation anyway.
    pub fn run(&self, only: Option<&str>, progress: &ProgressReporter) -> Result<RunSummary> {
        self.config.prepare()?;

        let mut stations = read_roster(&self.config.roster_path)?;
        if let Some(station_id) = only {
            stations.retain(|s| s == station_id);
            if stations.is_empty() {
                return Err(RefineryError::Config(format!(
                    "station {station_id} is not on the roster"
                )));
            }
        }

        let run_ts = batch_timestamp();
        info!(stations = stations.len(), %run_ts, "starting refinement run");

        let mut summary = RunSummary {
            run_ts,
            stations: Vec::new(),
            failures: Vec::new(),
        };
        for station_id in &stations {
            progress.set_message(&format!("refining station {station_id}"));
            match self.refine_station(station_id, run_ts) {
                Ok(station) => {
                    info!(
                        station_id,
                        written = station.inserted + station.replaced,
                        "station refined"
                    );
                    summary.stations.push(station);
                }
                Err(err) if err.is_consistency_violation() => {
                    error!(station_id, %err, "consistency violation, aborting run");
                    return Err(err);
                }
                Err(err) => {
                    warn!(station_id, %err, "station skipped");
                    summary.failures.push(StationFailure {
                        station_id: station_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
            progress.increment(1);
        }
        Ok(summary)
    }

    fn refine_station(&self, station_id: &str, run_ts: NaiveDateTime) -> Result<StationSummary> {
        let lake_path = self.config.lake_db(station_id);
        if !lake_path.is_file() {
            return Err(RefineryError::Config(format!(
                "no lake database for station {station_id}: {}",
                lake_path.display()
            )));
        }

        let mut raw = read_station_lake(&lake_path, station_id)?;
        let mut summary = StationSummary {
            station_id: station_id.to_string(),
            raw_rows: raw.len(),
            ..StationSummary::default()
        };

        reset_station_identity(&mut raw);
        let mut observations = derive_observations(raw);
        apply_quality_rules(&mut observations);

        let mut store = RefineryStore::open(&self.config.refinery_db(station_id))?;
        let committed = store.committed_timestamps(station_id)?;
        let before = observations.len();
        observations.retain(|obs| !committed.contains(&obs.timestamp));
        summary.already_committed = before - observations.len();
        summary.working_rows = observations.len();

        let mut outcome = UpsertOutcome::default();
        {
            let mut engine = UpsertEngine::new(&mut store, &self.config.work_dir);

            let (singles, duplicated) = partition_by_key(observations);
            let pass1 = resolve_singles(singles);
            summary.straight_copies = pass1.observations.len();
            outcome.absorb(engine.apply(&pass1, run_ts)?);

            let (pass2, conflicted) = collapse_identical(duplicated);
            self.check_residuals(station_id, "pass2", &pass2)?;
            summary.collapsed_duplicates = pass2.observations.len();
            outcome.absorb(engine.apply(&pass2, run_ts)?);

            // Pass 3, one key at a time. BTreeMap keeps the order of the
            // per-key batches stable across runs.
            let mut by_key: BTreeMap<ObsKey, Vec<Observation>> = BTreeMap::new();
            for obs in conflicted {
                by_key.entry(obs.key()).or_default().push(obs);
            }
            summary.conflicted_keys = by_key.len();
            for rows in by_key.values() {
                let (resolved, note) = resolve_conflicts(rows);
                let lineage: Vec<LineageRecord> = rows
                    .iter()
                    .map(|obs| LineageRecord::for_observation(obs, &note))
                    .collect();
                let batch = ResolvedBatch {
                    observations: resolved,
                    lineage,
                };
                self.check_residuals(station_id, "pass3", &batch)?;
                outcome.absorb(engine.apply(&batch, run_ts)?);
            }
        }

        summary.inserted = outcome.inserted;
        summary.replaced = outcome.replaced;
        summary.lineage_written = outcome.lineage_written;
        Ok(summary)
    }

    /// A pass that leaves more than one row per key has broken the store's
    /// core guarantee. Dump the evidence and abort.
    fn check_residuals(
        &self,
        station_id: &str,
        stage: &'static str,
        batch: &ResolvedBatch,
    ) -> Result<()> {
        let residuals = duplicate_keys(&batch.observations);
        if residuals.is_empty() {
            return Ok(());
        }
        let dump = diagnostics::dump_duplicates(
            &self.config.work_dir,
            station_id,
            stage,
            &batch.observations,
            &batch.lineage,
        )?;
        Err(RefineryError::ResidualDuplicates {
            stage,
            station_id: station_id.to_string(),
            count: residuals.len(),
            dump,
        })
    }
}

/// Wall-clock batch timestamp, truncated to whole seconds so it survives a
/// round trip through the TIMESTAMP columns unchanged.
fn batch_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Measurements, Provenance};

    #[test]
    fn batch_timestamp_has_whole_seconds() {
        assert_eq!(batch_timestamp().nanosecond(), 0);
    }

    fn conflicted_row(rownum: i64, station_name: &str, temp: f64) -> Observation {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        Observation {
            station_id: "330122".to_string(),
            timestamp: ts,
            location: Some("Prosser".to_string()),
            station_name: Some(station_name.to_string()),
            measurements: Measurements {
                air_temp_f: Some(temp),
                ..Measurements::default()
            },
            provenance: Provenance {
                source_filename: "330122_2020.csv".to_string(),
                source_rownum: rownum,
                source_download_timestamp: ts,
                source_load_timestamp: ts,
            },
        }
    }

    #[test]
    fn residual_duplicate_keys_abort_the_run_with_diagnostics() {
        let dir = TempDir::new().unwrap();
        let refinery = Refinery::new(RefineryConfig::new(
            dir.path().join("roster.csv"),
            dir.path().join("lake"),
            dir.path().join("refinery"),
            dir.path().join("work"),
        ));

        // Divergent station names on one key cannot be collapsed by the
        // column voting, so two rows survive with the same key.
        let a = conflicted_row(1, "Roza", 40.0);
        let b = conflicted_row(2, "Roza West", 41.0);
        let (resolved, note) = resolve_conflicts(&[a.clone(), b.clone()]);
        assert_eq!(resolved.len(), 2);
        let batch = ResolvedBatch {
            observations: resolved,
            lineage: vec![
                LineageRecord::for_observation(&a, &note),
                LineageRecord::for_observation(&b, &note),
            ],
        };

        let err = refinery
            .check_residuals("330122", "pass3", &batch)
            .unwrap_err();
        assert!(matches!(
            err,
            RefineryError::ResidualDuplicates {
                stage: "pass3",
                count: 1,
                ..
            }
        ));
        assert!(err.is_consistency_violation());

        let work = dir.path().join("work");
        assert!(work.join("330122_pass3_duplicates.csv").exists());
        assert!(work.join("330122_pass3_duplicates_lineage.csv").exists());
    }
}
