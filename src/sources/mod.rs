//! Upstream data sources.
//!
//! The static schedule and the real-time alert feed sit behind traits so
//! the pipeline can run against in-memory fixtures.

pub mod gtfs;
pub mod http;
pub mod realtime;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Alert, TripRow};

pub use http::{HttpAlertFeed, HttpScheduleSource};

/// Yields the trip rows of the static schedule.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_trips(&self) -> Result<Vec<TripRow>>;
}

/// Yields the alerts currently published in the real-time feed, in feed order.
#[async_trait]
pub trait AlertFeed: Send + Sync {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>>;
}

/// Fixed schedule, mostly for tests and dry runs.
#[async_trait]
impl ScheduleSource for Vec<TripRow> {
    async fn fetch_trips(&self) -> Result<Vec<TripRow>> {
        Ok(self.clone())
    }
}

/// Fixed alert list, mostly for tests and dry runs.
#[async_trait]
impl AlertFeed for Vec<Alert> {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.clone())
    }
}
