use thiserror::Error;

/// Errors that stop a statsvis component.
///
/// Malformed statsd lines are not errors at this level; the parser reports
/// them as [`ParseError`](crate::metrics::ParseError) and the receivers drop
/// them.
#[derive(Error, Debug)]
pub enum StatsvisError {
    /// Invalid or unreadable configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// A listener failed to bind or serve
    #[error("Network error: {0}")]
    Network(String),

    /// A percentile outside (0, 100)
    #[error("Invalid percentile {0}, must be > 0 and < 100")]
    InvalidPercentile(u32),

    /// Socket or file IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A spawned task panicked or was cancelled
    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The aggregator is gone and no longer accepts operations
    #[error("Ingestion queue closed")]
    QueueClosed,
}

/// Result type alias for statsvis operations
pub type Result<T> = std::result::Result<T, StatsvisError>;

impl StatsvisError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidPercentile(_) => "config",
            Self::Network(_) => "network",
            Self::Io(_) => "io",
            Self::Join(_) => "async",
            Self::QueueClosed => "channel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StatsvisError::network("address in use");
        assert_eq!(err.to_string(), "Network error: address in use");
        assert_eq!(err.category(), "network");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: StatsvisError = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert_eq!(err.category(), "io");
        assert_eq!(StatsvisError::QueueClosed.category(), "channel");
    }

    #[test]
    fn test_invalid_percentile_message() {
        let err = StatsvisError::InvalidPercentile(100);
        assert_eq!(err.to_string(), "Invalid percentile 100, must be > 0 and < 100");
        assert_eq!(err.category(), "config");
    }
}
