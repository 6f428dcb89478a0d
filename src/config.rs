use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RefineryError, Result};

/// Everything the orchestrator needs to know about its surroundings: where
/// the station roster lives, where the lake and refinery databases sit, and
/// where diagnostic artifacts go. Constructed from CLI arguments.
#[derive(Debug, Clone)]
pub struct RefineryConfig {
    pub roster_path: PathBuf,
    pub lake_dir: PathBuf,
    pub refinery_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl RefineryConfig {
    pub fn new(
        roster_path: impl Into<PathBuf>,
        lake_dir: impl Into<PathBuf>,
        refinery_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            roster_path: roster_path.into(),
            lake_dir: lake_dir.into(),
            refinery_dir: refinery_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Check the inputs exist and create the output directories.
    pub fn prepare(&self) -> Result<()> {
        if !self.roster_path.is_file() {
            return Err(RefineryError::Config(format!(
                "station roster not found: {}",
                self.roster_path.display()
            )));
        }
        if !self.lake_dir.is_dir() {
            return Err(RefineryError::Config(format!(
                "lake directory not found: {}",
                self.lake_dir.display()
            )));
        }
        fs::create_dir_all(&self.refinery_dir)?;
        fs::create_dir_all(&self.work_dir)?;
        Ok(())
    }

    pub fn lake_db(&self, station_id: &str) -> PathBuf {
        self.lake_dir.join(format!("dl_{station_id}.db"))
    }

    pub fn refinery_db(&self, station_id: &str) -> PathBuf {
        refinery_db_path(&self.refinery_dir, station_id)
    }
}

pub fn refinery_db_path(refinery_dir: &Path, station_id: &str) -> PathBuf {
    refinery_dir.join(format!("dr_{station_id}.db"))
}
