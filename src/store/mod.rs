pub mod refinery_store;
pub mod upsert;

pub use refinery_store::RefineryStore;
pub use upsert::{UpsertEngine, UpsertOutcome};
