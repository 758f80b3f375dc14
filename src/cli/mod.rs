//! Command-line interface for statsvis.
//!
//! Run `statsvis` to start a statsd server on the default ports with the
//! JSON query API on port 8080.

use crate::core::config::{parse_percentiles, ConfigBuilder};
use crate::core::{Config, LogLevel, Result, StatsvisError};
use crate::Application;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Standalone statsd server with built-in time-series queries
#[derive(Parser, Debug)]
#[command(name = "statsvis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Web UI / query API listen address
    #[arg(long = "webui", env = "STATSVIS_WEBUI")]
    pub web_ui: Option<SocketAddr>,

    /// statsd UDP listen address
    #[arg(long = "statsd-udp", env = "STATSVIS_STATSD_UDP")]
    pub statsd_udp: Option<SocketAddr>,

    /// statsd TCP listen address
    #[arg(long = "statsd-tcp", env = "STATSVIS_STATSD_TCP")]
    pub statsd_tcp: Option<SocketAddr>,

    /// Flush interval, e.g. "10s"
    #[arg(long, env = "STATSVIS_FLUSH", value_parser = parse_duration)]
    pub flush: Option<Duration>,

    /// How long to retain metrics, e.g. "30m"
    #[arg(long, env = "STATSVIS_RETENTION", value_parser = parse_duration)]
    pub retention: Option<Duration>,

    /// Percentiles for timer metrics, e.g. "90,95,99"
    #[arg(long, env = "STATSVIS_PERCENTILES")]
    pub percentiles: Option<String>,

    /// Configuration file path (default: ~/.config/statsvis/config.yaml)
    #[arg(short, long, env = "STATSVIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "STATSVIS_DEBUG")]
    pub debug: bool,

    /// Log with targets, thread ids and line numbers
    #[arg(long, env = "STATSVIS_STRUCTURED_LOGS")]
    pub structured_logs: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

fn parse_duration(s: &str) -> std::result::Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("statsvis").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/statsvis/config.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return self.build_config_from_args(builder);
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
            },
            Err(e) if self.config.is_some() => {
                return Err(StatsvisError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            // Defaults when the default path vanished after the exists check.
            Err(_) => {},
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(addr) = self.web_ui {
            builder = builder.web_ui(addr);
        }
        if let Some(addr) = self.statsd_udp {
            builder = builder.statsd_udp(addr);
        }
        if let Some(addr) = self.statsd_tcp {
            builder = builder.statsd_tcp(addr);
        }
        if let Some(flush) = self.flush {
            builder = builder.flush_interval(flush);
        }
        if let Some(retention) = self.retention {
            builder = builder.retention(retention);
        }
        if let Some(percentiles) = &self.percentiles {
            builder = builder.percentiles(parse_percentiles(percentiles)?);
        }
        if self.structured_logs {
            builder = builder.structured_logs(true);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging from the loaded configuration.
    ///
    /// `RUST_LOG` wins, then `--debug`, then `STATSVIS_LOG_LEVEL`, then the
    /// configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(log_directive(
                config.debug,
                std::env::var("STATSVIS_LOG_LEVEL").ok(),
                config.logging.level,
            ))
        });

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| StatsvisError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

fn log_directive(debug: bool, env_level: Option<String>, configured: LogLevel) -> String {
    if debug {
        return "debug".to_string();
    }
    match env_level {
        Some(level) if !level.trim().is_empty() => level,
        _ => configured.as_str().to_string(),
    }
}

/// Execute the statsvis application.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;
    tracing::debug!(?config, "Configuration loaded");

    if cli.check_config {
        config.validate()?;
        println!("Configuration is valid!");
        println!("  Web UI: {}", config.server.web_ui);
        println!("  statsd UDP: {}", config.server.statsd_udp);
        println!("  statsd TCP: {}", config.server.statsd_tcp);
        println!(
            "  Flush interval: {}",
            humantime::format_duration(config.aggregation.flush_interval)
        );
        println!("  Retention: {}", humantime::format_duration(config.aggregation.retention));
        println!("  Percentiles: {:?}", config.aggregation.percentiles);
        return Ok(());
    }

    tracing::info!("Starting statsvis {}", env!("CARGO_PKG_VERSION"));
    Application::new(config)?.run().await
}
