//! Configuration and error types shared by every statsvis component.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{parse_percentiles, AggregationConfig, Config, ConfigBuilder, LogLevel};
pub use error::{Result, StatsvisError};
