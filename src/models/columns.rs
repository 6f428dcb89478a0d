use crate::models::observation::Measurements;

/// Accessor pair for one numeric measurement column, letting the resolver
/// vote column by column without a match arm per field.
pub struct ColumnDef {
    pub name: &'static str,
    pub get: fn(&Measurements) -> Option<f64>,
    pub set: fn(&mut Measurements, Option<f64>),
}

/// The columns resolved independently in Pass 3, in table order. Wind
/// direction and speed are deliberately absent: they are resolved jointly.
pub const VOTED_COLUMNS: &[ColumnDef] = &[
    ColumnDef {
        name: "air_temp_f",
        get: |m| m.air_temp_f,
        set: |m, v| m.air_temp_f = v,
    },
    ColumnDef {
        name: "second_air_temp_f",
        get: |m| m.second_air_temp_f,
        set: |m, v| m.second_air_temp_f = v,
    },
    ColumnDef {
        name: "dew_point_f",
        get: |m| m.dew_point_f,
        set: |m, v| m.dew_point_f = v,
    },
    ColumnDef {
        name: "rel_humidity_perc",
        get: |m| m.rel_humidity_perc,
        set: |m, v| m.rel_humidity_perc = v,
    },
    ColumnDef {
        name: "leaf_wet_u",
        get: |m| m.leaf_wet_u,
        set: |m, v| m.leaf_wet_u = v,
    },
    ColumnDef {
        name: "wind_gust_mph",
        get: |m| m.wind_gust_mph,
        set: |m, v| m.wind_gust_mph = v,
    },
    ColumnDef {
        name: "bed_temp_f",
        get: |m| m.bed_temp_f,
        set: |m, v| m.bed_temp_f = v,
    },
    ColumnDef {
        name: "two_inch_soil_temp_f",
        get: |m| m.two_inch_soil_temp_f,
        set: |m, v| m.two_inch_soil_temp_f = v,
    },
    ColumnDef {
        name: "eight_inch_soil_temp_f",
        get: |m| m.eight_inch_soil_temp_f,
        set: |m, v| m.eight_inch_soil_temp_f = v,
    },
    ColumnDef {
        name: "soil_vwc_perc",
        get: |m| m.soil_vwc_perc,
        set: |m, v| m.soil_vwc_perc = v,
    },
    ColumnDef {
        name: "total_precip_inch",
        get: |m| m.total_precip_inch,
        set: |m, v| m.total_precip_inch = v,
    },
    ColumnDef {
        name: "solar_rad_watts_per_meter_squared",
        get: |m| m.solar_rad_watts_per_meter_squared,
        set: |m, v| m.solar_rad_watts_per_meter_squared = v,
    },
    ColumnDef {
        name: "atm_pressure_in_hg",
        get: |m| m.atm_pressure_in_hg,
        set: |m, v| m.atm_pressure_in_hg = v,
    },
];
