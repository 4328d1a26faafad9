//! metrolert CLI
//!
//! Local execution entry point. For AWS Lambda, use `metrolert-lambda`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrolert::{
    config::{load_config, secret_from_env},
    destinations::{self, Destination},
    error::Result,
    models::Config,
    pipeline::{ChangeDetector, Pipeline},
    runner::Runner,
    sources::realtime,
    storage::{FingerprintStore, LocalStore, ReadOnlyStore},
    utils::http,
};

/// metrolert - transit service alert publisher
#[derive(Parser, Debug)]
#[command(name = "metrolert", version, about = "Posts GTFS-Realtime service alerts")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pass over the feed
    Run {
        /// Log payloads instead of posting and leave the store untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Serve the manual trigger endpoint and run on an interval
    #[cfg(feature = "server")]
    Serve,

    /// Validate configuration and credentials
    Validate,

    /// Print the id and fingerprint of each alert in a local feed file
    Fingerprint {
        /// GTFS-Realtime protobuf file
        feed: PathBuf,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_store(config: &Config) -> Result<Arc<dyn FingerprintStore>> {
    #[cfg(feature = "s3")]
    if config.store.s3_bucket.is_some() {
        let store = metrolert::storage::S3Store::from_config(&config.store).await?;
        log::info!("Using S3 fingerprint store");
        return Ok(Arc::new(store));
    }

    log::info!("Using local fingerprint store at {}", config.store.dir.display());
    Ok(Arc::new(LocalStore::new(&config.store.dir)))
}

async fn build_runner(config: &Config, dry_run: bool) -> Result<Runner> {
    let client = http::create_client(&config.feeds)?;

    let mut store = open_store(config).await?;
    let destinations: Vec<Arc<dyn Destination>> = if dry_run {
        log::info!("Dry run: payloads are logged, fingerprints are not written");
        store = Arc::new(ReadOnlyStore::new(store));
        destinations::console_mirror(&config.destinations)
    } else {
        destinations::build_all(&config.destinations, &client, secret_from_env)?
    };

    let pipeline = Pipeline::from_config(config, client, store, destinations);
    Ok(Runner::new(
        Arc::new(pipeline),
        Duration::from_secs(config.scheduler.run_timeout_secs),
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run { dry_run } => {
            let runner = build_runner(&config, dry_run).await?;
            let report = runner.try_run().await?;
            if report.partially_failed > 0 || report.aborted > 0 {
                log::warn!(
                    "{} alerts partially failed, {} aborted",
                    report.partially_failed,
                    report.aborted
                );
            }
        }

        #[cfg(feature = "server")]
        Command::Serve => {
            let runner = Arc::new(build_runner(&config, false).await?);
            metrolert::server::serve(
                runner,
                &config.scheduler.bind,
                Duration::from_secs(config.scheduler.interval_secs),
            )
            .await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({} destinations)", config.destinations.len());

            let client = http::create_client(&config.feeds)?;
            let built = destinations::build_all(&config.destinations, &client, secret_from_env)
                .inspect_err(|e| log::error!("Credential check failed: {}", e))?;
            for destination in &built {
                let channel = destination.channel();
                log::info!(
                    "✓ {} ({:?}, max {:?} {:?})",
                    destination.name(),
                    channel.layout,
                    channel.max_length,
                    channel.metric
                );
            }

            log::info!("All validations passed!");
        }

        Command::Fingerprint { feed } => {
            let bytes = std::fs::read(&feed)?;
            let alerts = realtime::decode_alerts(&bytes, config.format.language.as_deref())?;
            let detector = ChangeDetector::new();
            for alert in &alerts {
                println!("{}\t{}", alert.id, detector.fingerprint(alert));
            }
            log::info!("{} alerts in {}", alerts.len(), feed.display());
        }
    }

    Ok(())
}
