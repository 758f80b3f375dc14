//! Common test utilities and fixtures.

#![allow(dead_code)]

use statsvis_lib::core::ConfigBuilder;
use statsvis_lib::metrics::{ingestion_queue, Aggregator, MetricRegistry, SnapshotRing};
use statsvis_lib::monitoring::Monitor;
use statsvis_lib::receiver::{LineSink, StatsdReceiver};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// A running receiver + aggregator pair on ephemeral loopback ports.
pub struct TestPipeline {
    pub registry: Arc<MetricRegistry>,
    pub store: Arc<SnapshotRing>,
    pub monitor: Arc<Monitor>,
    pub udp_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
}

impl TestPipeline {
    pub async fn start(flush_interval: Duration, capacity: usize) -> Self {
        let config = ConfigBuilder::new()
            .statsd_udp("127.0.0.1:0".parse().unwrap())
            .statsd_tcp("127.0.0.1:0".parse().unwrap())
            .build()
            .unwrap();

        let registry = Arc::new(MetricRegistry::new());
        let store = Arc::new(SnapshotRing::new(capacity));
        let monitor = Arc::new(Monitor::new());

        let (tx, rx) = ingestion_queue(config.server.queue_capacity);
        Aggregator::new(vec![90, 99], Arc::clone(&registry), Arc::clone(&store))
            .with_monitor(Arc::clone(&monitor))
            .spawn(rx, flush_interval);

        let sink = LineSink::new(tx, Arc::clone(&monitor));
        let receiver = StatsdReceiver::bind(&config.server, sink).await.unwrap();
        let udp_addr = receiver.udp_addr().unwrap();
        let tcp_addr = receiver.tcp_addr().unwrap();
        tokio::spawn(receiver.run());

        Self {
            registry,
            store,
            monitor,
            udp_addr,
            tcp_addr,
        }
    }

    /// Sum of a metric over every retained snapshot.
    pub fn total(&self, name: &str) -> f64 {
        self.store
            .query_range(&[name])
            .iter()
            .filter_map(|row| row.values[0])
            .sum()
    }

    /// Poll until `check` holds or five seconds pass.
    pub async fn wait_for<F: Fn(&Self) -> bool>(&self, check: F) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}
