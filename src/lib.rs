pub mod analyzers;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod readers;
pub mod refinery;
pub mod resolver;
pub mod store;
pub mod utils;

pub use error::{RefineryError, Result};
