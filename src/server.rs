//! Manual trigger endpoint and interval loop.
//!
//! - `GET /health`: liveness
//! - `POST /run`: run one pass now and return its report

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::runner::Runner;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ErrorBody {
    fn response(status: StatusCode, error: &'static str, message: String) -> Response {
        (status, Json(Self { error, message })).into_response()
    }
}

/// Build the HTTP router.
pub fn router(runner: Arc<Runner>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(trigger))
        .with_state(runner)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn trigger(State(runner): State<Arc<Runner>>) -> Response {
    log::info!("Manual run requested");
    match runner.try_run().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(AppError::RunInProgress) => ErrorBody::response(
            StatusCode::CONFLICT,
            "conflict",
            AppError::RunInProgress.to_string(),
        ),
        Err(e @ AppError::Timeout(_)) => {
            ErrorBody::response(StatusCode::GATEWAY_TIMEOUT, "timeout", e.to_string())
        }
        Err(e) if e.is_upstream() => {
            ErrorBody::response(StatusCode::BAD_GATEWAY, "upstream", e.to_string())
        }
        Err(e) => {
            log::error!("Manual run failed: {}", e);
            ErrorBody::response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
        }
    }
}

/// Serve the trigger endpoint and run the interval loop until Ctrl-C.
pub async fn serve(runner: Arc<Runner>, bind: &str, interval: Duration) -> Result<()> {
    let ticker = tokio::spawn(runner.clone().run_every(interval));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!(
        "Listening on {}, running every {}s",
        listener.local_addr()?,
        interval.as_secs()
    );

    axum::serve(listener, router(runner))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C"),
        _ = terminate => log::info!("Received SIGTERM"),
    }
}
