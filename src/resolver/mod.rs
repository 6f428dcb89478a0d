pub mod invariant;
pub mod normalize;
pub mod passes;

pub use invariant::duplicate_keys;
pub use normalize::{apply_quality_rules, derive_observations, reset_station_identity};
pub use passes::{
    collapse_identical, partition_by_key, resolve_conflicts, resolve_singles, ResolvedBatch,
};
