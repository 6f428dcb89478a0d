use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::analyzers::{DEFAULT_LOWER_PERCENTILE, DEFAULT_UPPER_PERCENTILE};

#[derive(Parser)]
#[command(name = "refinery")]
#[command(about = "Reconciles raw weather station readings into canonical per-timestamp rows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Suppress progress output")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the refinery databases for every station on the roster
    Init {
        #[arg(short, long, help = "Station roster CSV (station_id column)")]
        roster: PathBuf,

        #[arg(short = 'd', long, help = "Directory for refinery databases")]
        refinery_dir: PathBuf,

        #[arg(long, default_value = "false", help = "Drop and recreate existing tables")]
        overwrite: bool,
    },

    /// Refine the lake rows of every roster station into canonical rows
    Refine {
        #[arg(short, long, help = "Station roster CSV (station_id column)")]
        roster: PathBuf,

        #[arg(short, long, help = "Directory holding the lake databases (dl_<id>.db)")]
        lake_dir: PathBuf,

        #[arg(short = 'd', long, help = "Directory for refinery databases")]
        refinery_dir: PathBuf,

        #[arg(short, long, help = "Directory for diagnostics and run summaries")]
        work_dir: PathBuf,

        #[arg(short, long, help = "Refine a single station instead of the roster")]
        station_id: Option<String>,
    },

    /// Export a station's canonical rows and lineage to CSV
    Export {
        #[arg(short = 'd', long, help = "Directory holding the refinery databases")]
        refinery_dir: PathBuf,

        #[arg(short, long)]
        station_id: String,

        #[arg(short, long, help = "Directory the CSV files are written to")]
        output_dir: PathBuf,
    },

    /// Report yearly air temperature extremes for a station
    Extremes {
        #[arg(short = 'd', long, help = "Directory holding the refinery databases")]
        refinery_dir: PathBuf,

        #[arg(short, long)]
        station_id: String,

        #[arg(long, default_value_t = DEFAULT_LOWER_PERCENTILE)]
        lower_percentile: f64,

        #[arg(long, default_value_t = DEFAULT_UPPER_PERCENTILE)]
        upper_percentile: f64,
    },
}
