//! Boundary to the data lake: per-station SQLite files (`dl_<id>.db`) whose
//! `dl_weather` table holds raw rows exactly as parsed from the source
//! files. The upstream ingestion component owns writing these; the refinery
//! only reads. The create/insert helpers exist for seeding fixtures and
//! small tooling.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};
use tracing::info;

use crate::error::Result;
use crate::models::{Measurements, Provenance, RawObservation};

const LAKE_DDL: &str = "
CREATE TABLE IF NOT EXISTS dl_weather (
    station_id      TEXT        NOT NULL,
    location        TEXT,
    station_name    TEXT,
    date            TEXT,
    time_pdt        TEXT,
    time_pst        TEXT,
    air_temp_f              REAL,
    second_air_temp_f       REAL,
    dew_point_f             REAL,
    rel_humidity_perc       REAL,
    leaf_wet_u              REAL,
    wind_dir_at_speed_mph   TEXT,
    wind_gust_mph           REAL,
    bed_temp_f              REAL,
    two_inch_soil_temp_f    REAL,
    eight_inch_soil_temp_f  REAL,
    soil_vwc_perc           REAL,
    total_precip_inch       REAL,
    solar_rad_watts_per_meter_squared   REAL,
    atm_pressure_in_hg      REAL,
    source_filename             TEXT        NOT NULL,
    source_rownum               INTEGER     NOT NULL,
    source_download_timestamp   TIMESTAMP   NOT NULL,
    source_load_timestamp       TIMESTAMP   NOT NULL,
    PRIMARY KEY (source_filename, source_rownum, source_download_timestamp)
)";

/// Create an empty lake database for a station.
pub fn create_lake_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute(LAKE_DDL, [])?;
    Ok(conn)
}

/// Insert one raw row into a lake database.
pub fn insert_raw_observation(conn: &Connection, row: &RawObservation) -> Result<()> {
    let m = &row.measurements;
    let p = &row.provenance;
    conn.execute(
        "INSERT INTO dl_weather (
            station_id, location, station_name, date, time_pdt, time_pst,
            air_temp_f, second_air_temp_f, dew_point_f, rel_humidity_perc,
            leaf_wet_u, wind_dir_at_speed_mph, wind_gust_mph, bed_temp_f,
            two_inch_soil_temp_f, eight_inch_soil_temp_f, soil_vwc_perc,
            total_precip_inch, solar_rad_watts_per_meter_squared,
            atm_pressure_in_hg, source_filename, source_rownum,
            source_download_timestamp, source_load_timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
        params![
            row.station_id,
            row.location,
            row.station_name,
            row.date,
            row.time_pdt,
            row.time_pst,
            m.air_temp_f,
            m.second_air_temp_f,
            m.dew_point_f,
            m.rel_humidity_perc,
            m.leaf_wet_u,
            row.wind_dir_at_speed_mph,
            m.wind_gust_mph,
            m.bed_temp_f,
            m.two_inch_soil_temp_f,
            m.eight_inch_soil_temp_f,
            m.soil_vwc_perc,
            m.total_precip_inch,
            m.solar_rad_watts_per_meter_squared,
            m.atm_pressure_in_hg,
            p.source_filename,
            p.source_rownum,
            p.source_download_timestamp,
            p.source_load_timestamp,
        ],
    )?;
    Ok(())
}

/// Read every raw row for one station, in load order. Load order matters:
/// the identity reset takes the last-loaded station name and location.
pub fn read_station_lake(path: &Path, station_id: &str) -> Result<Vec<RawObservation>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(
        "SELECT station_id, location, station_name, date, time_pdt, time_pst,
                air_temp_f, second_air_temp_f, dew_point_f, rel_humidity_perc,
                leaf_wet_u, wind_dir_at_speed_mph, wind_gust_mph, bed_temp_f,
                two_inch_soil_temp_f, eight_inch_soil_temp_f, soil_vwc_perc,
                total_precip_inch, solar_rad_watts_per_meter_squared,
                atm_pressure_in_hg, source_filename, source_rownum,
                source_download_timestamp, source_load_timestamp
         FROM dl_weather
         WHERE station_id = ?1
         ORDER BY source_load_timestamp, source_filename, source_rownum",
    )?;

    let rows = stmt.query_map(params![station_id], |row| {
        Ok(RawObservation {
            station_id: row.get(0)?,
            location: row.get(1)?,
            station_name: row.get(2)?,
            date: row.get(3)?,
            time_pdt: row.get(4)?,
            time_pst: row.get(5)?,
            measurements: Measurements {
                air_temp_f: row.get(6)?,
                second_air_temp_f: row.get(7)?,
                dew_point_f: row.get(8)?,
                rel_humidity_perc: row.get(9)?,
                leaf_wet_u: row.get(10)?,
                wind_dir: None,
                wind_speed_mph: None,
                wind_gust_mph: row.get(12)?,
                bed_temp_f: row.get(13)?,
                two_inch_soil_temp_f: row.get(14)?,
                eight_inch_soil_temp_f: row.get(15)?,
                soil_vwc_perc: row.get(16)?,
                total_precip_inch: row.get(17)?,
                solar_rad_watts_per_meter_squared: row.get(18)?,
                atm_pressure_in_hg: row.get(19)?,
            },
            wind_dir_at_speed_mph: row.get(11)?,
            provenance: Provenance {
                source_filename: row.get(20)?,
                source_rownum: row.get(21)?,
                source_download_timestamp: row.get(22)?,
                source_load_timestamp: row.get(23)?,
            },
        })
    })?;

    let mut observations = Vec::new();
    for row in rows {
        observations.push(row?);
    }
    info!(
        station_id,
        rows = observations.len(),
        lake = %path.display(),
        "loaded raw rows from lake"
    );
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn raw(station: &str, rownum: i64) -> RawObservation {
        let ts = NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        RawObservation {
            station_id: station.to_string(),
            location: Some("Prosser".to_string()),
            station_name: Some("Roza".to_string()),
            date: Some("2020-05-31".to_string()),
            time_pdt: Some("06:15".to_string()),
            time_pst: None,
            wind_dir_at_speed_mph: Some("N@ 5.0".to_string()),
            measurements: Measurements {
                air_temp_f: Some(55.2),
                ..Measurements::default()
            },
            provenance: Provenance {
                source_filename: format!("{station}_2020.csv"),
                source_rownum: rownum,
                source_download_timestamp: ts,
                source_load_timestamp: ts,
            },
        }
    }

    #[test]
    fn lake_round_trip_filters_by_station() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dl_330122.db");
        let conn = create_lake_db(&path).unwrap();
        insert_raw_observation(&conn, &raw("330122", 1)).unwrap();
        insert_raw_observation(&conn, &raw("330122", 2)).unwrap();
        insert_raw_observation(&conn, &raw("999999", 1)).unwrap();
        drop(conn);

        let rows = read_station_lake(&path, "330122").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], raw("330122", 1));
        assert_eq!(rows[1].provenance.source_rownum, 2);
    }
}
