//! Station roster: the CSV that names which stations the refinery runs
//! over. One column, `station_id`, extra columns ignored.

use std::path::Path;

use serde::Deserialize;

use crate::error::{RefineryError, Result};

#[derive(Debug, Deserialize)]
struct RosterEntry {
    station_id: String,
}

/// Read the roster. Blank ids are dropped; an empty roster is an error so a
/// misconfigured path never silently refines nothing.
pub fn read_roster(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut stations = Vec::new();
    for entry in reader.deserialize::<RosterEntry>() {
        let entry = entry?;
        let station_id = entry.station_id.trim().to_string();
        if !station_id.is_empty() {
            stations.push(station_id);
        }
    }
    if stations.is_empty() {
        return Err(RefineryError::EmptyRoster(path.to_path_buf()));
    }
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn reads_station_ids_and_skips_blanks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "station_id,notes\n330122,Roza\n ,\n100110,\n").unwrap();

        let stations = read_roster(&path).unwrap();
        assert_eq!(stations, vec!["330122".to_string(), "100110".to_string()]);
    }

    #[test]
    fn empty_roster_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "station_id\n").unwrap();

        let err = read_roster(&path).unwrap_err();
        assert!(matches!(err, RefineryError::EmptyRoster(_)));
    }
}
