// src/lambda/mod.rs

//! AWS Lambda handler for scheduled runs.
//!
//! Each invocation:
//! 1. Loads the config named by `METROLERT_CONFIG` plus env overrides
//! 2. Opens the S3 fingerprint store named by `store.s3_bucket`
//! 3. Runs one pass and reports the counts

use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::{load_config, secret_from_env};
use crate::destinations;
use crate::error::{AppError, Result};
use crate::models::{Config, StoreConfig};
use crate::pipeline::{Pipeline, RunReport};
use crate::runner::Runner;
use crate::storage::{FingerprintStore, S3Store};
use crate::utils::http::create_client;

const CONFIG_ENV: &str = "METROLERT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub alerts_seen: usize,
    pub alerts_published: usize,
    pub alerts_committed: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub execution_time_ms: u64,
}

impl From<&RunReport> for RunResponse {
    fn from(report: &RunReport) -> Self {
        Self {
            success: true,
            alerts_seen: report.seen,
            alerts_published: report.delivered + report.partially_failed,
            alerts_committed: report.committed,
            error: None,
            execution_time_ms: 0,
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(event: LambdaEvent<Value>) -> std::result::Result<RunResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (payload, _context) = event.into_parts();
    info!("Scheduled invocation: {}", payload);

    let elapsed_ms = || start.elapsed().as_millis() as u64;

    match run().await {
        Ok(report) => {
            let response = RunResponse {
                execution_time_ms: elapsed_ms(),
                ..RunResponse::from(&report)
            };
            info!(
                "Run completed: {} seen, {} published in {}ms",
                response.alerts_seen, response.alerts_published, response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Ok(RunResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: elapsed_ms(),
                ..Default::default()
            })
        }
    }
}

async fn run() -> Result<RunReport> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&path)?;

    let store = open_store(&config).await?;
    let client = create_client(&config.feeds)?;
    let destinations = destinations::build_all(&config.destinations, &client, secret_from_env)?;

    let pipeline = Pipeline::from_config(&config, client, store, destinations);
    let runner = Runner::new(
        Arc::new(pipeline),
        Duration::from_secs(config.scheduler.run_timeout_secs),
    );
    runner.try_run().await
}

/// The function filesystem is read-only and reset on cold start, so
/// fingerprints only persist in S3.
fn require_bucket(store: &StoreConfig) -> Result<&str> {
    store
        .s3_bucket
        .as_deref()
        .filter(|bucket| !bucket.trim().is_empty())
        .ok_or_else(|| AppError::config("store.s3_bucket is required under lambda"))
}

async fn open_store(config: &Config) -> Result<Arc<dyn FingerprintStore>> {
    let bucket = require_bucket(&config.store)?;
    let store = S3Store::from_config(&config.store).await?;
    info!("Using S3 fingerprint store in {}", bucket);
    Ok(Arc::new(store))
}
