//! Configuration management for statsvis.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides (applied by the CLI)
//! - Validation and defaults

use crate::core::{Result, StatsvisError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Default bound on pending operations between receivers and the aggregator.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Complete configuration for statsvis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Aggregation window and retention configuration
    pub aggregation: AggregationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP query API listen address
    pub web_ui: SocketAddr,
    /// statsd UDP listen address
    pub statsd_udp: SocketAddr,
    /// statsd TCP listen address
    pub statsd_tcp: SocketAddr,
    /// Maximum operations pending between receivers and the aggregator
    pub queue_capacity: usize,
    /// Receive buffer size for a single UDP datagram, also the TCP line limit
    pub max_datagram_size: usize,
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Length of one aggregation window
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// How long snapshots are retained
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Percentiles computed for timers, each in (0, 100)
    pub percentiles: Vec<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            aggregation: AggregationConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            web_ui: SocketAddr::from(([0, 0, 0, 0], 8080)),
            statsd_udp: SocketAddr::from(([127, 0, 0, 1], 8125)),
            statsd_tcp: SocketAddr::from(([127, 0, 0, 1], 8125)),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_datagram_size: 16384,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            flush_interval: Duration::from_secs(10),
            retention: Duration::from_secs(30 * 60),
            percentiles: vec![90, 95, 99],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.queue_capacity == 0 {
            return Err(StatsvisError::config("queue_capacity must be greater than 0"));
        }

        if self.server.max_datagram_size == 0 {
            return Err(StatsvisError::config("max_datagram_size must be greater than 0"));
        }

        self.aggregation.validate()
    }
}

impl AggregationConfig {
    /// Validate flush interval, retention and percentiles.
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(StatsvisError::config("flush_interval must be greater than 0"));
        }

        if self.retention.is_zero() {
            return Err(StatsvisError::config("retention must be greater than 0"));
        }

        if self.percentiles.is_empty() {
            return Err(StatsvisError::config("at least one percentile is required"));
        }

        for &p in &self.percentiles {
            validate_percentile(p)?;
        }

        Ok(())
    }

    /// Number of snapshots the store retains: `retention / flush_interval`,
    /// rounded, never less than one.
    pub fn ring_capacity(&self) -> usize {
        if self.flush_interval.is_zero() {
            return 1;
        }
        let ratio = self.retention.as_secs_f64() / self.flush_interval.as_secs_f64();
        (ratio.round() as usize).max(1)
    }
}

fn validate_percentile(p: u32) -> Result<()> {
    if p == 0 || p >= 100 {
        return Err(StatsvisError::InvalidPercentile(p));
    }
    Ok(())
}

/// Parse a comma separated percentile list such as `"90,95,99"`.
///
/// Each entry must be an integer strictly between 0 and 100. The result is
/// sorted ascending.
pub fn parse_percentiles(s: &str) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        let p: u32 = part.parse().map_err(|e| {
            StatsvisError::config(format!("invalid percentiles string '{}': {}", s, e))
        })?;
        validate_percentile(p)?;
        out.push(p);
    }
    out.sort_unstable();
    Ok(out)
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| StatsvisError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the HTTP query API address
    pub fn web_ui(mut self, addr: SocketAddr) -> Self {
        self.config.server.web_ui = addr;
        self
    }

    /// Set the statsd UDP address
    pub fn statsd_udp(mut self, addr: SocketAddr) -> Self {
        self.config.server.statsd_udp = addr;
        self
    }

    /// Set the statsd TCP address
    pub fn statsd_tcp(mut self, addr: SocketAddr) -> Self {
        self.config.server.statsd_tcp = addr;
        self
    }

    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.aggregation.flush_interval = interval;
        self
    }

    /// Set the retention duration
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.aggregation.retention = retention;
        self
    }

    /// Set the timer percentiles
    pub fn percentiles(mut self, percentiles: Vec<u32>) -> Self {
        self.config.aggregation.percentiles = percentiles;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable structured logging
    pub fn structured_logs(mut self, structured: bool) -> Self {
        self.config.logging.structured = structured;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aggregation.ring_capacity(), 180);
    }

    #[test]
    fn test_zero_flush_interval() {
        let mut config = Config::default();
        config.aggregation.flush_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_percentile_bounds() {
        let mut config = Config::default();
        config.aggregation.percentiles = vec![0];
        assert!(config.validate().is_err());

        config.aggregation.percentiles = vec![100];
        assert!(config.validate().is_err());

        config.aggregation.percentiles = vec![];
        assert!(config.validate().is_err());

        config.aggregation.percentiles = vec![1, 50, 99];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ring_capacity_rounds_and_floors_at_one() {
        let mut agg = AggregationConfig::default();
        agg.flush_interval = Duration::from_secs(10);
        agg.retention = Duration::from_secs(25);
        assert_eq!(agg.ring_capacity(), 3);

        agg.retention = Duration::from_secs(1);
        assert_eq!(agg.ring_capacity(), 1);
    }

    #[test]
    fn test_parse_percentiles() {
        assert_eq!(parse_percentiles("99, 90,95").unwrap(), vec![90, 95, 99]);
        assert!(parse_percentiles("90,abc").is_err());
        assert!(parse_percentiles("").is_err());
        assert!(matches!(
            parse_percentiles("50,100"),
            Err(StatsvisError::InvalidPercentile(100))
        ));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .flush_interval(Duration::from_secs(1))
            .retention(Duration::from_secs(60))
            .percentiles(vec![50])
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.aggregation.ring_capacity(), 60);
        assert_eq!(config.aggregation.percentiles, vec![50]);
        assert!(config.debug);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
server:
  statsd_udp: "127.0.0.1:9125"
  queue_capacity: 50
aggregation:
  flush_interval: 5s
  retention: 1h
  percentiles: [75, 99]
logging:
  level: debug
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(config.server.statsd_udp.port(), 9125);
        assert_eq!(config.server.statsd_tcp.port(), 8125);
        assert_eq!(config.server.queue_capacity, 50);
        assert_eq!(config.aggregation.flush_interval, Duration::from_secs(5));
        assert_eq!(config.aggregation.ring_capacity(), 720);
        assert_eq!(config.aggregation.percentiles, vec![75, 99]);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }
}
