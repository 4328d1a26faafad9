// src/models/mod.rs

//! Domain models for the alert pipeline.
//!
//! This module contains the data structures shared by the pipeline stages,
//! organized by their primary purpose.

mod alert;
mod config;
mod trip;

// Re-export all public types
pub use alert::{Alert, InformedEntity};
pub use config::{
    Config, DestinationConfig, FeedsConfig, FormatConfig, SchedulerConfig, StoreConfig,
};
pub use trip::{TripRecord, TripRow};
