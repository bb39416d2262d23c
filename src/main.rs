mod cli;
mod config;
mod disk;
mod error;
mod fetch;
mod prelude;
mod progress;
mod resume;
mod segments;
mod supervisor;
mod workers;

use cli::Cli;
use config::DownloadConfig;
use fetch::HttpFetcher;
use progress::{QuietProgress, TerminalProgress};
use supervisor::{Outcome, Supervisor};

use crate::prelude::*;
use clap::Parser;
use std::sync::Arc;
use tracing::Level;

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let quiet = cli.quiet;
    let config = DownloadConfig::try_from(cli)?;
    let output = config.output.clone();

    let fetcher = Arc::new(HttpFetcher::new(reqwest::Client::new()));
    let supervisor = Supervisor::new(fetcher, config);

    let outcome = if quiet {
        supervisor.run(|_| QuietProgress).await
    } else {
        supervisor
            .run(|plan| {
                TerminalProgress::new(plan.workers, plan.total_length, plan.already_downloaded)
            })
            .await
    }
    .with_context(|| format!("downloading to {}", output.display()))?;

    match outcome {
        Outcome::AlreadyComplete => info!("nothing to do"),
        Outcome::Downloaded {
            segments_fetched,
            segments_skipped,
        } => info!(
            segments_fetched,
            segments_skipped,
            "saved {}",
            output.display()
        ),
    }

    Ok(())
}
