//! statsvis - standalone statsd server with in-memory time-series queries.
//!
//! statsvis listens for statsd lines over UDP and TCP, aggregates them into
//! fixed flush windows and keeps a bounded history of snapshots that can be
//! queried over HTTP.
//!
//! # Architecture
//!
//! - `receiver`: UDP and TCP listeners feeding the ingestion queue
//! - `metrics`: line parser, aggregator, name registry and snapshot ring
//! - `api`: JSON query endpoints over the registry and ring
//! - `core`: configuration and errors
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use statsvis_lib::core::Config;
//! use statsvis_lib::Application;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let app = Application::new(config)?;
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod application;
pub mod cli;
pub mod core;
pub mod metrics;
pub mod monitoring;
pub mod receiver;

// Re-export core types for convenience
pub use crate::application::Application;
pub use crate::core::{Config, Result};
