//! Temperature extremes over the refined data: per calendar year, the low
//! and high percentiles of air temperature. Runs against the canonical rows
//! only, so duplicated source readings never skew the tails.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Datelike;
use serde::Serialize;
use tracing::info;

use crate::error::{RefineryError, Result};
use crate::store::RefineryStore;

pub const DEFAULT_LOWER_PERCENTILE: f64 = 1.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 99.0;

#[derive(Debug, Clone, Serialize)]
pub struct YearlyExtremes {
    pub year: i32,
    pub readings: usize,
    pub low_f: f64,
    pub high_f: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationExtremes {
    pub station_id: String,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub years: Vec<YearlyExtremes>,
}

pub struct ExtremesAnalyzer {
    lower_percentile: f64,
    upper_percentile: f64,
}

impl ExtremesAnalyzer {
    pub fn new(lower_percentile: f64, upper_percentile: f64) -> Result<Self> {
        for p in [lower_percentile, upper_percentile] {
            if !(0.0..=100.0).contains(&p) {
                return Err(RefineryError::Config(format!(
                    "percentile out of range: {p}"
                )));
            }
        }
        if lower_percentile > upper_percentile {
            return Err(RefineryError::Config(format!(
                "lower percentile {lower_percentile} above upper {upper_percentile}"
            )));
        }
        Ok(Self {
            lower_percentile,
            upper_percentile,
        })
    }

    /// Analyze one station's refined database. Years with no air temperature
    /// readings are omitted.
    pub fn analyze(&self, db_path: &Path, station_id: &str) -> Result<StationExtremes> {
        let store = RefineryStore::open(db_path)?;
        let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for row in store.fetch_observations()? {
            if row.resolved.station_id != station_id {
                continue;
            }
            if let Some(temp) = row.resolved.measurements.air_temp_f {
                by_year.entry(row.resolved.timestamp.year()).or_default().push(temp);
            }
        }

        let years = by_year
            .into_iter()
            .map(|(year, mut temps)| {
                temps.sort_by(|a, b| a.total_cmp(b));
                YearlyExtremes {
                    year,
                    readings: temps.len(),
                    low_f: percentile(&temps, self.lower_percentile),
                    high_f: percentile(&temps, self.upper_percentile),
                }
            })
            .collect::<Vec<_>>();

        info!(station_id, years = years.len(), "computed temperature extremes");
        Ok(StationExtremes {
            station_id: station_id.to_string(),
            lower_percentile: self.lower_percentile,
            upper_percentile: self.upper_percentile,
            years,
        })
    }
}

impl Default for ExtremesAnalyzer {
    fn default() -> Self {
        Self {
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
        }
    }
}

/// Percentile with linear interpolation between the two nearest ranks.
/// `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return sorted[below];
    }
    let weight = rank - below as f64;
    sorted[below] * (1.0 - weight) + sorted[above] * weight
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert_eq!(percentile(&values, 50.0), 2.5);
        // Rank 0.03, between the first two values.
        assert!((percentile(&values, 1.0) - 1.03).abs() < 1e-12);
    }

    #[test]
    fn percentile_of_single_value() {
        assert_eq!(percentile(&[42.0], 99.0), 42.0);
    }

    #[test]
    fn analyzer_rejects_bad_percentiles() {
        assert!(ExtremesAnalyzer::new(1.0, 101.0).is_err());
        assert!(ExtremesAnalyzer::new(99.0, 1.0).is_err());
        assert!(ExtremesAnalyzer::new(1.0, 99.0).is_ok());
    }
}
