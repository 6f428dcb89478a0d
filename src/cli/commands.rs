use std::fs;

use crate::analyzers::ExtremesAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::config::{refinery_db_path, RefineryConfig};
use crate::error::Result;
use crate::readers::read_roster;
use crate::refinery::Refinery;
use crate::store::RefineryStore;
use crate::utils::progress::ProgressReporter;

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init {
            roster,
            refinery_dir,
            overwrite,
        } => {
            let stations = read_roster(&roster)?;
            fs::create_dir_all(&refinery_dir)?;

            let progress = ProgressReporter::new(
                stations.len() as u64,
                "Creating refinery databases...",
                cli.quiet,
            );
            for station_id in &stations {
                RefineryStore::create(&refinery_db_path(&refinery_dir, station_id), overwrite)?;
                progress.increment(1);
            }
            progress.finish_with_message(&format!("{} databases ready", stations.len()));
        }

        Commands::Refine {
            roster,
            lake_dir,
            refinery_dir,
            work_dir,
            station_id,
        } => {
            let config = RefineryConfig::new(roster, lake_dir, refinery_dir, work_dir.clone());
            let station_count = if station_id.is_some() {
                1
            } else {
                read_roster(&config.roster_path)?.len()
            };

            let progress = ProgressReporter::new(
                station_count as u64,
                "Refining station data...",
                cli.quiet,
            );
            let summary = Refinery::new(config).run(station_id.as_deref(), &progress)?;
            progress.finish_with_message(&format!(
                "Refined {} stations, {} rows written",
                summary.stations.len(),
                summary.total_written()
            ));

            // The run summary is the machine-readable record of what the
            // run did; failures included.
            let summary_path = work_dir.join(format!(
                "refine_run_{}.json",
                summary.run_ts.format("%Y%m%dT%H%M%S")
            ));
            fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
            println!("Run summary written to {}", summary_path.display());

            for failure in &summary.failures {
                println!(
                    "⚠️  Station {} skipped: {}",
                    failure.station_id, failure.error
                );
            }
        }

        Commands::Export {
            refinery_dir,
            station_id,
            output_dir,
        } => {
            let store = RefineryStore::open(&refinery_db_path(&refinery_dir, &station_id))?;
            fs::create_dir_all(&output_dir)?;

            let data_path = output_dir.join(format!("{station_id}_weather.csv"));
            let mut writer = csv::Writer::from_path(&data_path)?;
            let mut rows = 0usize;
            for row in store.fetch_observations()? {
                writer.serialize(&row)?;
                rows += 1;
            }
            writer.flush()?;

            let lineage_path = output_dir.join(format!("{station_id}_lineage.csv"));
            let mut writer = csv::Writer::from_path(&lineage_path)?;
            for row in store.fetch_lineage()? {
                writer.serialize(&row)?;
            }
            writer.flush()?;

            println!("Exported {} rows to {}", rows, data_path.display());
            println!("Lineage written to {}", lineage_path.display());
        }

        Commands::Extremes {
            refinery_dir,
            station_id,
            lower_percentile,
            upper_percentile,
        } => {
            let analyzer = ExtremesAnalyzer::new(lower_percentile, upper_percentile)?;
            let extremes =
                analyzer.analyze(&refinery_db_path(&refinery_dir, &station_id), &station_id)?;

            if extremes.years.is_empty() {
                println!("No air temperature readings for station {station_id}");
                return Ok(());
            }
            println!(
                "Air temperature extremes for station {station_id} \
                 (p{lower_percentile} / p{upper_percentile}):"
            );
            for year in &extremes.years {
                println!(
                    "{}: low {:.1}°F, high {:.1}°F ({} readings)",
                    year.year, year.low_f, year.high_f, year.readings
                );
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
