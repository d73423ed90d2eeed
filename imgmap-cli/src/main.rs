use anyhow::Result;
use clap::Parser;
use imgmap_core::{logging, Config};
use imgmap_hal::LinuxHal;

mod cli;
mod commands;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let hal = LinuxHal::new();

    match &cli.command {
        cli::Commands::Decode { image, output } => commands::decode(&hal, &config, image, output),
        cli::Commands::Map { image, keep } => commands::map(&hal, &config, image, *keep),
        cli::Commands::Detach { device } => commands::detach(&hal, device),
    }
}
