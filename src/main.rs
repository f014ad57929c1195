//! # Tech Digest
//!
//! Runs one aggregation pass and writes the snapshot files.
//!
//! ## Usage
//!
//! ```sh
//! tech_digest --data-dir ./data --publish-dir ./docs/data
//! ```
//!
//! The process exits non-zero only when the configuration cannot be loaded or
//! the HTTP clients cannot be built. Source failures degrade the snapshot
//! instead of failing the run.

use clap::Parser;
use std::error::Error;
use tech_digest::aggregator::Aggregator;
use tech_digest::cli::Cli;
use tech_digest::config::Config;
use tech_digest::outputs::json::{JsonSnapshotWriter, SnapshotSink};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tech_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.data_dir, ?args.publish_dir, "Parsed CLI arguments");

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration could not be loaded");
            return Err(e);
        }
    };
    if let Some(data_dir) = args.data_dir {
        config.output.data_dir = data_dir;
    }
    if let Some(publish_dir) = args.publish_dir {
        config.output.publish_dir = publish_dir;
    }

    let writer = JsonSnapshotWriter::new(&config.output);
    let aggregator = Aggregator::from_config(config)?;

    let run = aggregator.run().await;

    match writer.persist(&run).await {
        Ok(written) => info!(files = written.len(), date = %run.date, "Snapshot persisted"),
        Err(e) => error!(error = %e, "Snapshot could not be persisted"),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
