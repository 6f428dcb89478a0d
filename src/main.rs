use anyhow::Result;
use clap::Parser;
use weather_refinery::cli::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)?;
    Ok(())
}
