use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::observation::Observation;

/// Where a raw row came from: enough to locate the exact source line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source_filename: String,
    /// 1-based row number within the source file.
    pub source_rownum: i64,
    pub source_download_timestamp: NaiveDateTime,
    pub source_load_timestamp: NaiveDateTime,
}

/// Audit trail entry: one per raw observation consumed by the refinery,
/// pointing at the canonical row it contributed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageRecord {
    pub provenance: Provenance,
    /// Free-text resolution explanation ("straight copy", "mean used for
    /// air_temp_f", ...).
    pub target_lineage_note: String,
    pub target_station_id: String,
    pub target_timestamp: NaiveDateTime,
}

impl LineageRecord {
    pub fn for_observation(obs: &Observation, note: impl Into<String>) -> Self {
        LineageRecord {
            provenance: obs.provenance.clone(),
            target_lineage_note: note.into(),
            target_station_id: obs.station_id.clone(),
            target_timestamp: obs.timestamp,
        }
    }

    /// Logical key used for replace semantics in the Lineage Store.
    pub fn target_key(&self) -> (String, NaiveDateTime) {
        (self.target_station_id.clone(), self.target_timestamp)
    }
}

/// A lineage record as persisted, with its batch timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct LineageRow {
    pub record: LineageRecord,
    pub load_batch_ts: NaiveDateTime,
    pub update_batch_ts: NaiveDateTime,
}
