//! Diagnostic side files written when a consistency invariant breaks: the
//! offending rows and their lineage, as CSV, in the work directory. These
//! artifacts are the primary evidence surfaced for a failed station run.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::models::{LineageRecord, ResolvedObservation};

/// Dump the rows of a failed batch plus their lineage. Returns the path of
/// the data dump; the lineage lands next to it with a `_lineage` suffix.
pub fn dump_duplicates(
    work_dir: &Path,
    station_id: &str,
    stage: &str,
    rows: &[ResolvedObservation],
    lineage: &[LineageRecord],
) -> Result<PathBuf> {
    fs::create_dir_all(work_dir)?;

    let data_path = work_dir.join(format!("{station_id}_{stage}_duplicates.csv"));
    let mut writer = csv::Writer::from_path(&data_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let lineage_path = work_dir.join(format!("{station_id}_{stage}_duplicates_lineage.csv"));
    let mut writer = csv::Writer::from_path(&lineage_path)?;
    for record in lineage {
        writer.serialize(record)?;
    }
    writer.flush()?;

    warn!(
        station_id,
        stage,
        rows = rows.len(),
        dump = %data_path.display(),
        "dumped duplicate rows for inspection"
    );
    Ok(data_path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Measurements, Observation, Provenance};

    #[test]
    fn writes_data_and_lineage_side_files() {
        let dir = TempDir::new().unwrap();
        let ts = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let obs = Observation {
            station_id: "330122".to_string(),
            timestamp: ts,
            location: None,
            station_name: None,
            measurements: Measurements {
                air_temp_f: Some(40.0),
                ..Measurements::default()
            },
            provenance: Provenance {
                source_filename: "330122_2020.csv".to_string(),
                source_rownum: 1,
                source_download_timestamp: ts,
                source_load_timestamp: ts,
            },
        };
        let rows = vec![ResolvedObservation::from(&obs)];
        let lineage = vec![LineageRecord::for_observation(&obs, "test")];

        let dump = dump_duplicates(dir.path(), "330122", "pass2", &rows, &lineage).unwrap();
        assert!(dump.exists());
        assert!(dir
            .path()
            .join("330122_pass2_duplicates_lineage.csv")
            .exists());
        let contents = fs::read_to_string(&dump).unwrap();
        assert!(contents.contains("330122"));
    }
}
