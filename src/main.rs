use anyhow::{Context, Result};
use clap::Parser;

mod analysis;
mod auth;
mod config;
mod engine;
mod expr;
mod geo;
mod report;
mod stats;
mod targets;

use config::Cli;
use engine::EarthEngine;
use stats::{StatsCache, StatsFetcher};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let project = cli.project_id()?;
    let credentials = auth::SystemCredentials::new()?;
    let token = auth::acquire_token(&credentials).context("initializing Earth Engine credentials")?;
    let engine = EarthEngine::new(&cli.api_url, &project, token)?;

    if let Some(message) = targets::missing_file_message(&cli.targets) {
        eprintln!("{}", message);
        std::process::exit(targets::MISSING_FILE_EXIT_CODE);
    }
    let targets = targets::load_targets(&cli.targets)?;
    let settings = cli.settings();

    println!("--- Processing Cities ({} Data) ---\n", settings.year);

    let mut fetcher = StatsFetcher::with_cache(engine, StatsCache::new());
    let rows = analysis::analyze_all(&targets, &mut fetcher, &settings)?;
    log::debug!("{} distinct locations fetched", fetcher.cache().len());

    report::print_table(&rows);

    report::write_csv(&cli.out, &rows)?;
    println!("\nResults saved to {}", cli.out);

    Ok(())
}
