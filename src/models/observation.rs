use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::lineage::Provenance;
use crate::models::wind::CompassPoint;

/// Primary key of the Observation Store.
pub type ObsKey = (String, NaiveDateTime);

/// The measurement columns carried by every observation, raw or resolved.
/// Every column is nullable: sources routinely report partial rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub air_temp_f: Option<f64>,
    pub second_air_temp_f: Option<f64>,
    pub dew_point_f: Option<f64>,
    pub rel_humidity_perc: Option<f64>,
    pub leaf_wet_u: Option<f64>,
    pub wind_dir: Option<CompassPoint>,
    pub wind_speed_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub bed_temp_f: Option<f64>,
    pub two_inch_soil_temp_f: Option<f64>,
    pub eight_inch_soil_temp_f: Option<f64>,
    pub soil_vwc_perc: Option<f64>,
    pub total_precip_inch: Option<f64>,
    pub solar_rad_watts_per_meter_squared: Option<f64>,
    pub atm_pressure_in_hg: Option<f64>,
}

impl Measurements {
    /// True when every column other than total_precip_inch and
    /// solar_rad_watts_per_meter_squared is null. A row in this state is a
    /// sensor outage; any precipitation or solar reading alongside it is
    /// spurious.
    pub fn is_outage_apart_from_precip_and_solar(&self) -> bool {
        self.air_temp_f.is_none()
            && self.second_air_temp_f.is_none()
            && self.dew_point_f.is_none()
            && self.rel_humidity_perc.is_none()
            && self.leaf_wet_u.is_none()
            && self.wind_dir.is_none()
            && self.wind_speed_mph.is_none()
            && self.wind_gust_mph.is_none()
            && self.bed_temp_f.is_none()
            && self.two_inch_soil_temp_f.is_none()
            && self.eight_inch_soil_temp_f.is_none()
            && self.soil_vwc_perc.is_none()
            && self.atm_pressure_in_hg.is_none()
    }

    /// Bit-exact fingerprint of the numeric columns plus wind direction.
    /// Used for duplicate suppression, so equality must be representation
    /// equality, not float comparison.
    fn fingerprint(&self) -> ([Option<u64>; 14], Option<CompassPoint>) {
        let bits = |v: Option<f64>| v.map(f64::to_bits);
        (
            [
                bits(self.air_temp_f),
                bits(self.second_air_temp_f),
                bits(self.dew_point_f),
                bits(self.rel_humidity_perc),
                bits(self.leaf_wet_u),
                bits(self.wind_speed_mph),
                bits(self.wind_gust_mph),
                bits(self.bed_temp_f),
                bits(self.two_inch_soil_temp_f),
                bits(self.eight_inch_soil_temp_f),
                bits(self.soil_vwc_perc),
                bits(self.total_precip_inch),
                bits(self.solar_rad_watts_per_meter_squared),
                bits(self.atm_pressure_in_hg),
            ],
            self.wind_dir,
        )
    }
}

/// One row exactly as it sits in the data lake: untyped date/time strings,
/// the combined direction-at-speed wind field, and full provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub station_id: String,
    pub location: Option<String>,
    pub station_name: Option<String>,
    pub date: Option<String>,
    pub time_pdt: Option<String>,
    pub time_pst: Option<String>,
    pub wind_dir_at_speed_mph: Option<String>,
    /// Numeric columns already typed by the lake loader. The wind pair stays
    /// empty until normalization splits the combined field.
    pub measurements: Measurements,
    pub provenance: Provenance,
}

/// A raw row after timestamp derivation and wind splitting. This is the
/// resolver's working record; it is never mutated once partitioned.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub timestamp: NaiveDateTime,
    pub location: Option<String>,
    pub station_name: Option<String>,
    pub measurements: Measurements,
    pub provenance: Provenance,
}

impl Observation {
    pub fn key(&self) -> ObsKey {
        (self.station_id.clone(), self.timestamp)
    }

    /// Identity over the non-provenance columns, bit-exact on floats.
    pub fn data_key(&self) -> DataKey {
        let (bits, wind_dir) = self.measurements.fingerprint();
        DataKey {
            station_id: self.station_id.clone(),
            timestamp: self.timestamp,
            location: self.location.clone(),
            station_name: self.station_name.clone(),
            bits,
            wind_dir,
        }
    }
}

/// Hashable identity of an observation's data columns, provenance excluded.
/// Two observations with equal keys collapse to one row in Pass 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataKey {
    station_id: String,
    timestamp: NaiveDateTime,
    location: Option<String>,
    station_name: Option<String>,
    bits: [Option<u64>; 14],
    wind_dir: Option<CompassPoint>,
}

/// Canonical record, exactly one per (station_id, timestamp).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedObservation {
    pub station_id: String,
    pub timestamp: NaiveDateTime,
    pub location: Option<String>,
    pub station_name: Option<String>,
    pub measurements: Measurements,
}

impl ResolvedObservation {
    pub fn key(&self) -> ObsKey {
        (self.station_id.clone(), self.timestamp)
    }
}

impl From<&Observation> for ResolvedObservation {
    fn from(obs: &Observation) -> Self {
        ResolvedObservation {
            station_id: obs.station_id.clone(),
            timestamp: obs.timestamp,
            location: obs.location.clone(),
            station_name: obs.station_name.clone(),
            measurements: obs.measurements.clone(),
        }
    }
}

/// A canonical record as persisted, with its batch timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRow {
    pub resolved: ResolvedObservation,
    /// First write for this key. Immutable once set.
    pub load_batch_ts: NaiveDateTime,
    /// Refreshed on every rewrite of the row.
    pub update_batch_ts: NaiveDateTime,
}
