// src/pipeline/run.rs

//! One pass of the alert pipeline.
//!
//! Build the schedule index, decode the feed, then for every alert in feed
//! order: classify, render, publish, commit. Upstream failures abort the
//! pass before anything is written; per-alert failures are contained.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::destinations::Destination;
use crate::error::{AppError, Result};
use crate::models::{Alert, Config};
use crate::pipeline::{
    AlertStatus, ChangeDetector, ContentFormatter, PublishOutcome, Publisher, ScheduleIndex,
};
use crate::sources::{AlertFeed, HttpAlertFeed, HttpScheduleSource, ScheduleSource};
use crate::storage::FingerprintStore;

/// What happened to one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDisposition {
    /// Fingerprint matched; nothing published
    Unchanged,
    /// Every destination accepted every post
    Delivered,
    /// At least one destination failed; fingerprint still committed
    PartiallyFailed,
    /// Failed before any publish attempt; left uncommitted
    AbortedBeforePublish { reason: String },
    /// Panicked once publishing had begun; some posts may have gone out,
    /// fingerprint left uncommitted
    AbortedDuringPublish { reason: String },
}

impl AlertDisposition {
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Self::AbortedBeforePublish { .. } | Self::AbortedDuringPublish { .. }
        )
    }
}

/// Per-alert result.
#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub alert_id: String,
    pub status: Option<AlertStatus>,
    pub disposition: AlertDisposition,
    /// Whether the new fingerprint was written
    pub committed: bool,
    pub outcomes: Vec<PublishOutcome>,
}

impl AlertReport {
    fn aborted(alert_id: &str, disposition: AlertDisposition) -> Self {
        Self {
            alert_id: alert_id.to_string(),
            status: None,
            disposition,
            committed: false,
            outcomes: Vec::new(),
        }
    }
}

/// Summary of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub trips_indexed: usize,
    pub seen: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub delivered: usize,
    pub partially_failed: usize,
    pub aborted: usize,
    pub committed: usize,
    pub alerts: Vec<AlertReport>,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>, trips_indexed: usize, alerts: Vec<AlertReport>) -> Self {
        let count_status = |status| {
            alerts
                .iter()
                .filter(|a| a.status == Some(status))
                .count()
        };
        let count_disposition = |f: fn(&AlertDisposition) -> bool| {
            alerts.iter().filter(|a| f(&a.disposition)).count()
        };

        Self {
            started_at,
            finished_at: Utc::now(),
            trips_indexed,
            seen: alerts.len(),
            new: count_status(AlertStatus::New),
            changed: count_status(AlertStatus::Changed),
            unchanged: count_status(AlertStatus::Unchanged),
            delivered: count_disposition(|d| matches!(d, AlertDisposition::Delivered)),
            partially_failed: count_disposition(|d| {
                matches!(d, AlertDisposition::PartiallyFailed)
            }),
            aborted: count_disposition(AlertDisposition::is_aborted),
            committed: alerts.iter().filter(|a| a.committed).count(),
            alerts,
        }
    }

    /// Number of posts attempted across all alerts and destinations.
    pub fn publish_attempts(&self) -> usize {
        self.alerts.iter().map(|a| a.outcomes.len()).sum()
    }

    fn log_summary(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "Run finished in {}ms: {} alerts ({} new, {} changed, {} unchanged), \
             {} delivered, {} partially failed, {} aborted, {} committed",
            elapsed.num_milliseconds(),
            self.seen,
            self.new,
            self.changed,
            self.unchanged,
            self.delivered,
            self.partially_failed,
            self.aborted,
            self.committed
        );
    }
}

/// Wires the sources, store and publisher for repeated passes.
pub struct Pipeline {
    schedule: Arc<dyn ScheduleSource>,
    feed: Arc<dyn AlertFeed>,
    store: Arc<dyn FingerprintStore>,
    publisher: Publisher,
    formatter: ContentFormatter,
    detector: ChangeDetector,
    key_prefix: String,
}

impl Pipeline {
    pub fn new(
        schedule: Arc<dyn ScheduleSource>,
        feed: Arc<dyn AlertFeed>,
        store: Arc<dyn FingerprintStore>,
        publisher: Publisher,
        formatter: ContentFormatter,
    ) -> Self {
        Self {
            schedule,
            feed,
            store,
            publisher,
            formatter,
            detector: ChangeDetector::new(),
            key_prefix: crate::models::StoreConfig::default().key_prefix,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Pipeline reading both feeds over HTTP.
    pub fn from_config(
        config: &Config,
        client: reqwest::Client,
        store: Arc<dyn FingerprintStore>,
        destinations: Vec<Arc<dyn Destination>>,
    ) -> Self {
        let schedule = HttpScheduleSource::from_config(client.clone(), &config.feeds);
        let feed = HttpAlertFeed::from_config(client, &config.feeds, &config.format);
        Self::new(
            Arc::new(schedule),
            Arc::new(feed),
            store,
            Publisher::new(destinations),
            ContentFormatter::new(&config.format),
        )
        .with_key_prefix(config.store.key_prefix.clone())
    }

    /// Store key for an alert.
    pub fn store_key(&self, alert_id: &str) -> String {
        format!("{}{}", self.key_prefix, alert_id)
    }

    /// Run one full pass.
    ///
    /// Returns an error only when a feed cannot be fetched or decoded; in
    /// that case nothing has been published or written.
    pub async fn run_once(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        log::info!("Run started");

        let rows = self
            .schedule
            .fetch_trips()
            .await
            .map_err(|e| as_upstream("schedule", e))?;
        let index = ScheduleIndex::build(rows);
        log::info!("Indexed {} trips", index.len());

        let alerts = self
            .feed
            .fetch_alerts()
            .await
            .map_err(|e| as_upstream("alerts", e))?;

        let mut reports = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            let publishing = AtomicBool::new(false);
            let report = match AssertUnwindSafe(self.process_alert(alert, &index, &publishing))
                .catch_unwind()
                .await
            {
                Ok(report) => report,
                Err(panic) => {
                    let reason = format!("panic: {}", panic_message(panic.as_ref()));
                    log::error!("[{}] {} while processing", alert.id, reason);
                    let disposition = if publishing.load(Ordering::Relaxed) {
                        AlertDisposition::AbortedDuringPublish { reason }
                    } else {
                        AlertDisposition::AbortedBeforePublish { reason }
                    };
                    AlertReport::aborted(&alert.id, disposition)
                }
            };
            reports.push(report);
        }

        let report = RunReport::new(started_at, index.len(), reports);
        report.log_summary();
        Ok(report)
    }

    async fn process_alert(
        &self,
        alert: &Alert,
        index: &ScheduleIndex,
        publishing: &AtomicBool,
    ) -> AlertReport {
        let key = self.store_key(&alert.id);

        let prior = match self.store.get(&key).await {
            Ok(prior) => prior,
            Err(e) => {
                log::error!("[{}] fingerprint read failed: {}", alert.id, e);
                return AlertReport::aborted(
                    &alert.id,
                    AlertDisposition::AbortedBeforePublish {
                        reason: e.to_string(),
                    },
                );
            }
        };

        let classification = self.detector.classify(alert, prior.as_deref());
        let status = classification.status;
        if !status.is_publishable() {
            log::debug!("[{}] unchanged", alert.id);
            return AlertReport {
                alert_id: alert.id.clone(),
                status: Some(status),
                disposition: AlertDisposition::Unchanged,
                committed: false,
                outcomes: Vec::new(),
            };
        }
        log::info!("[{}] {:?}, publishing", alert.id, status);

        let payloads = self
            .formatter
            .format_all(alert, index, self.publisher.channels());
        publishing.store(true, Ordering::Relaxed);
        let outcomes = self.publisher.publish(&alert.id, &payloads).await;

        let committed = match self
            .store
            .put(&key, classification.fingerprint.as_str())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "[{}] fingerprint write failed, alert may repeat next run: {}",
                    alert.id,
                    e
                );
                false
            }
        };

        let disposition = if outcomes.iter().all(PublishOutcome::success) {
            AlertDisposition::Delivered
        } else {
            AlertDisposition::PartiallyFailed
        };

        AlertReport {
            alert_id: alert.id.clone(),
            status: Some(status),
            disposition,
            committed,
            outcomes,
        }
    }
}

fn as_upstream(source_name: &str, e: AppError) -> AppError {
    if e.is_upstream() {
        e
    } else {
        AppError::upstream(source_name, e)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
