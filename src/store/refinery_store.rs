//! The per-station refinery database: the Observation Store (`dr_weather`,
//! primary key (station_id, timestamp)) and the Lineage Store
//! (`dr_lineage`, informational, logically keyed by the target key).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::error::Result;
use crate::models::{
    CompassPoint, LineageRecord, LineageRow, Measurements, ObservationRow, Provenance,
    ResolvedObservation,
};

const OBSERVATION_DDL: &str = "
CREATE TABLE IF NOT EXISTS dr_weather (
    station_id      TEXT        NOT NULL,
    timestamp       TIMESTAMP   NOT NULL,
    location        TEXT,
    station_name    TEXT,
    air_temp_f              REAL,
    second_air_temp_f       REAL,
    dew_point_f             REAL,
    rel_humidity_perc       REAL,
    leaf_wet_u              REAL,
    wind_dir                TEXT,
    wind_speed_mph          REAL,
    wind_gust_mph           REAL,
    bed_temp_f              REAL,
    two_inch_soil_temp_f    REAL,
    eight_inch_soil_temp_f  REAL,
    soil_vwc_perc           REAL,
    total_precip_inch       REAL,
    solar_rad_watts_per_meter_squared   REAL,
    atm_pressure_in_hg      REAL,
    load_batch_ts           TIMESTAMP NOT NULL,
    update_batch_ts         TIMESTAMP NOT NULL,
    PRIMARY KEY (station_id, timestamp)
)";

const LINEAGE_DDL: &str = "
CREATE TABLE IF NOT EXISTS dr_lineage (
    source_filename             TEXT,
    source_rownum               INTEGER,
    source_download_timestamp   TIMESTAMP,
    source_load_timestamp       TIMESTAMP,
    target_lineage_note         TEXT,
    target_station_id           TEXT        NOT NULL,
    target_timestamp            TIMESTAMP   NOT NULL,
    load_batch_ts               TIMESTAMP   NOT NULL,
    update_batch_ts             TIMESTAMP   NOT NULL
)";

pub struct RefineryStore {
    pub(crate) conn: Connection,
    path: PathBuf,
}

impl RefineryStore {
    /// Open a station's refinery database, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create a station's refinery database. With `overwrite` the existing
    /// tables are dropped first.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        if overwrite {
            conn.execute("DROP TABLE IF EXISTS dr_weather", [])?;
            conn.execute("DROP TABLE IF EXISTS dr_lineage", [])?;
            info!(db = %path.display(), "dropped existing refinery tables");
        }
        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        info!(db = %path.display(), "refinery database ready");
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(OBSERVATION_DDL, [])?;
        self.conn.execute(LINEAGE_DDL, [])?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamps already committed for a station. Rows at these timestamps
    /// are excluded from a run's input, which is what makes redriving a
    /// crashed run safe.
    pub fn committed_timestamps(&self, station_id: &str) -> Result<HashSet<NaiveDateTime>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT timestamp FROM dr_weather WHERE station_id = ?1")?;
        let rows = stmt.query_map(params![station_id], |row| row.get(0))?;
        let mut timestamps = HashSet::new();
        for ts in rows {
            timestamps.insert(ts?);
        }
        Ok(timestamps)
    }

    pub fn observation_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dr_weather", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn lineage_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dr_lineage", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn fetch_observations(&self) -> Result<Vec<ObservationRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT station_id, timestamp, location, station_name,
                    air_temp_f, second_air_temp_f, dew_point_f, rel_humidity_perc,
                    leaf_wet_u, wind_dir, wind_speed_mph, wind_gust_mph,
                    bed_temp_f, two_inch_soil_temp_f, eight_inch_soil_temp_f,
                    soil_vwc_perc, total_precip_inch, solar_rad_watts_per_meter_squared,
                    atm_pressure_in_hg, load_batch_ts, update_batch_ts
             FROM dr_weather
             ORDER BY station_id, timestamp",
        )?;
        let rows = stmt.query_map([], observation_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn fetch_lineage(&self) -> Result<Vec<LineageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_filename, source_rownum, source_download_timestamp,
                    source_load_timestamp, target_lineage_note, target_station_id,
                    target_timestamp, load_batch_ts, update_batch_ts
             FROM dr_lineage
             ORDER BY target_station_id, target_timestamp, source_filename, source_rownum",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LineageRow {
                record: LineageRecord {
                    provenance: Provenance {
                        source_filename: row.get(0)?,
                        source_rownum: row.get(1)?,
                        source_download_timestamp: row.get(2)?,
                        source_load_timestamp: row.get(3)?,
                    },
                    target_lineage_note: row.get(4)?,
                    target_station_id: row.get(5)?,
                    target_timestamp: row.get(6)?,
                },
                load_batch_ts: row.get(7)?,
                update_batch_ts: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<ObservationRow> {
    let wind_dir = match row.get::<_, Option<String>>(9)? {
        Some(s) => Some(CompassPoint::parse(&s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                rusqlite::types::Type::Text,
                format!("not a compass point: {s}").into(),
            )
        })?),
        None => None,
    };
    Ok(ObservationRow {
        resolved: ResolvedObservation {
            station_id: row.get(0)?,
            timestamp: row.get(1)?,
            location: row.get(2)?,
            station_name: row.get(3)?,
            measurements: Measurements {
                air_temp_f: row.get(4)?,
                second_air_temp_f: row.get(5)?,
                dew_point_f: row.get(6)?,
                rel_humidity_perc: row.get(7)?,
                leaf_wet_u: row.get(8)?,
                wind_dir,
                wind_speed_mph: row.get(10)?,
                wind_gust_mph: row.get(11)?,
                bed_temp_f: row.get(12)?,
                two_inch_soil_temp_f: row.get(13)?,
                eight_inch_soil_temp_f: row.get(14)?,
                soil_vwc_perc: row.get(15)?,
                total_precip_inch: row.get(16)?,
                solar_rad_watts_per_meter_squared: row.get(17)?,
                atm_pressure_in_hg: row.get(18)?,
            },
        },
        load_batch_ts: row.get(19)?,
        update_batch_ts: row.get(20)?,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn create_with_overwrite_resets_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dr_test.db");

        let store = RefineryStore::create(&path, false).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO dr_weather (station_id, timestamp, load_batch_ts, update_batch_ts)
                 VALUES ('A', '2020-01-01T00:00:00', '2020-01-02T00:00:00', '2020-01-02T00:00:00')",
                [],
            )
            .unwrap();
        drop(store);

        let kept = RefineryStore::create(&path, false).unwrap();
        assert_eq!(kept.observation_count().unwrap(), 1);
        drop(kept);

        let wiped = RefineryStore::create(&path, true).unwrap();
        assert_eq!(wiped.observation_count().unwrap(), 0);
    }

    #[test]
    fn committed_timestamps_are_scoped_to_station() {
        let dir = TempDir::new().unwrap();
        let store = RefineryStore::open(&dir.path().join("dr_test.db")).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO dr_weather (station_id, timestamp, load_batch_ts, update_batch_ts)
                 VALUES ('A', '2020-01-01T00:00:00', '2020-01-02T00:00:00', '2020-01-02T00:00:00'),
                        ('B', '2020-01-01T06:00:00', '2020-01-02T00:00:00', '2020-01-02T00:00:00')",
                [],
            )
            .unwrap();
        let committed = store.committed_timestamps("A").unwrap();
        assert_eq!(committed.len(), 1);
    }
}
