pub mod columns;
pub mod lineage;
pub mod observation;
pub mod wind;

pub use columns::{ColumnDef, VOTED_COLUMNS};
pub use lineage::{LineageRecord, LineageRow, Provenance};
pub use observation::{
    DataKey, Measurements, ObsKey, Observation, ObservationRow, RawObservation,
    ResolvedObservation,
};
pub use wind::CompassPoint;
