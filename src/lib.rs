// src/lib.rs

//! metrolert: posts new and changed GTFS-Realtime service alerts to social
//! channels.

pub mod config;
pub mod destinations;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod runner;
#[cfg(feature = "server")]
pub mod server;
pub mod sources;
pub mod storage;
pub mod utils;
