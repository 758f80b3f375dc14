//! Main application entry point for statsvis.

use crate::api::{self, ApiState};
use crate::core::{Config, Result};
use crate::metrics::{ingestion_queue, Aggregator, MetricRegistry, SnapshotRing};
use crate::monitoring::Monitor;
use crate::receiver::{LineSink, StatsdReceiver};
use std::future::Future;
use std::sync::Arc;

/// Main application struct that coordinates all components of statsvis.
pub struct Application {
    /// Metric name registry shared by aggregator and API
    registry: Arc<MetricRegistry>,
    /// Snapshot ring buffer shared by aggregator and API
    store: Arc<SnapshotRing>,
    /// Pipeline counters
    monitor: Arc<Monitor>,
    /// Application configuration
    config: Config,
}

impl Application {
    /// Create a new Application with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(SnapshotRing::new(config.aggregation.ring_capacity()));

        Ok(Self {
            registry: Arc::new(MetricRegistry::new()),
            store,
            monitor: Arc::new(Monitor::new()),
            config,
        })
    }

    /// Run the receivers, aggregator and query API until Ctrl-C or until a
    /// listener stops.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, stopping");
        })
        .await
    }

    /// Run until `shutdown` completes or until a listener stops.
    ///
    /// The receivers are stopped first so the ingestion queue closes and
    /// the aggregator flushes the open window before exiting.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let aggregation = &self.config.aggregation;
        let (queue_tx, queue_rx) = ingestion_queue(self.config.server.queue_capacity);

        let aggregator = Aggregator::new(
            aggregation.percentiles.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
        )
        .with_monitor(Arc::clone(&self.monitor));
        let aggregator_handle = aggregator.spawn(queue_rx, aggregation.flush_interval);

        let sink = LineSink::new(queue_tx, Arc::clone(&self.monitor));
        let receiver = StatsdReceiver::bind(&self.config.server, sink).await?;

        tracing::info!(
            flush_interval = %humantime::format_duration(aggregation.flush_interval),
            retention = %humantime::format_duration(aggregation.retention),
            percentiles = ?aggregation.percentiles,
            capacity = self.store.capacity(),
            "Aggregation configured"
        );

        let mut receiver_handle = tokio::spawn(receiver.run());

        let state = ApiState {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            monitor: Arc::clone(&self.monitor),
            aggregation: aggregation.clone(),
        };
        let mut api_handle = tokio::spawn(api::start_server(self.config.server.web_ui, state));

        let result = tokio::select! {
            _ = shutdown => Ok(()),
            result = &mut receiver_handle => {
                tracing::warn!("statsd receivers stopped unexpectedly");
                result.unwrap_or_else(|e| Err(e.into()))
            }
            result = &mut api_handle => {
                tracing::warn!("Web server stopped unexpectedly");
                result.unwrap_or_else(|e| Err(e.into()))
            }
        };

        if let Err(e) = &result {
            tracing::error!(category = e.category(), error = %e, "Shutting down after failure");
        }

        api_handle.abort();
        receiver_handle.abort();
        // Once the receiver task is gone every queue sender is dropped.
        let _ = receiver_handle.await;
        if let Err(e) = aggregator_handle.await {
            tracing::error!(error = %e, "Aggregator task failed");
        }
        tracing::info!("Bye.");

        result
    }

    /// Get a reference to the metric name registry.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Get a reference to the snapshot store.
    pub fn store(&self) -> &Arc<SnapshotRing> {
        &self.store
    }

    /// Get a reference to the pipeline monitor.
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Get the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigBuilder;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_store_sized_from_retention() {
        let config = ConfigBuilder::new()
            .flush_interval(Duration::from_secs(10))
            .retention(Duration::from_secs(60))
            .build()
            .unwrap();

        let app = Application::new(config).unwrap();
        assert_eq!(app.store().capacity(), 6);
        assert!(app.registry().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.aggregation.percentiles = vec![100];
        assert!(Application::new(config).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_open_window() {
        // Reserve a TCP port; UDP and the web UI take ephemeral ones.
        let tcp_addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let config = ConfigBuilder::new()
            .web_ui("127.0.0.1:0".parse().unwrap())
            .statsd_udp("127.0.0.1:0".parse().unwrap())
            .statsd_tcp(tcp_addr)
            .flush_interval(Duration::from_secs(3600))
            .build()
            .unwrap();

        let app = Application::new(config).unwrap();
        let store = Arc::clone(app.store());
        let monitor = Arc::clone(app.monitor());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(app.run_until(async {
            let _ = stop_rx.await;
        }));

        let mut stream = loop {
            match tokio::net::TcpStream::connect(tcp_addr).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };
        stream.write_all(b"final:7|c\n").await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while monitor.stats().operations_queued < 1 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.is_empty());

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let rows = store.query_range(&["final"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Some(7.0)]);
        assert_eq!(monitor.stats().flushes, 1);
    }
}
