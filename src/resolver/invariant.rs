use std::collections::BTreeMap;

use crate::models::{ObsKey, ResolvedObservation};

/// The refinery-wide consistency assertion: a batch is sound iff the number
/// of distinct (station_id, timestamp) keys equals the row count. Returns
/// the offending keys, sorted, when it is not. Callers treat a non-empty
/// result as fatal.
pub fn duplicate_keys(rows: &[ResolvedObservation]) -> Vec<ObsKey> {
    let mut counts: BTreeMap<ObsKey, usize> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.key()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key)
        .collect()
}
