pub mod diagnostics;
pub mod progress;

pub use progress::ProgressReporter;
