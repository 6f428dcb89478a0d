pub mod extremes;

pub use extremes::{
    ExtremesAnalyzer, StationExtremes, YearlyExtremes, DEFAULT_LOWER_PERCENTILE,
    DEFAULT_UPPER_PERCENTILE,
};
