pub mod orchestrator;

pub use orchestrator::{Refinery, RunSummary, StationFailure, StationSummary};
