//! The aggregator task.
//!
//! A single task owns the [`WindowState`]. It drains the bounded ingestion
//! queue and, once per flush interval, publishes a snapshot to the store
//! and the names it saw to the registry. Nothing else touches the window,
//! so it needs no lock; the queue is the only synchronization point.

use crate::metrics::registry::MetricRegistry;
use crate::metrics::ring_buffer::SnapshotRing;
use crate::metrics::types::Operation;
use crate::metrics::window::WindowState;
use crate::monitoring::Monitor;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Producer side of the ingestion queue. `send` waits while the queue is full.
pub type OperationSender = mpsc::Sender<Operation>;
/// Consumer side of the ingestion queue, held by the aggregator.
pub type OperationReceiver = mpsc::Receiver<Operation>;

/// Create the bounded ingestion queue.
pub fn ingestion_queue(capacity: usize) -> (OperationSender, OperationReceiver) {
    mpsc::channel(capacity)
}

/// Owner of the current aggregation window.
pub struct Aggregator {
    window: WindowState,
    percentiles: Vec<u32>,
    registry: Arc<MetricRegistry>,
    store: Arc<SnapshotRing>,
    monitor: Option<Arc<Monitor>>,
}

impl Aggregator {
    /// Create an aggregator publishing into `registry` and `store`.
    pub fn new(percentiles: Vec<u32>, registry: Arc<MetricRegistry>, store: Arc<SnapshotRing>) -> Self {
        Self {
            window: WindowState::new(),
            percentiles,
            registry,
            store,
            monitor: None,
        }
    }

    /// Count flushes on `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Apply one operation to the open window.
    #[inline]
    pub fn apply(&mut self, op: Operation) {
        self.window.apply(op);
    }

    /// Close the window now.
    pub fn flush(&mut self) {
        self.flush_at(Utc::now());
    }

    /// Close the window with an explicit timestamp.
    pub fn flush_at(&mut self, at: DateTime<Utc>) {
        let (snapshot, names) = self.window.flush(at, &self.percentiles);
        let size = snapshot.len();

        self.registry.record_derived(names.derived);
        self.registry.record_primary(names.primary);
        self.store.append(snapshot);

        if let Some(monitor) = &self.monitor {
            monitor.record_flush();
        }

        tracing::debug!(metrics = size, retained = self.store.len(), "Flushed window");
    }

    /// Run until every sender is dropped, flushing every `flush_interval`.
    ///
    /// Ticks and operations are handled one at a time in the order they are
    /// picked up, so each operation lands in exactly one window. Pending
    /// state is flushed once more when the queue closes.
    pub async fn run(mut self, mut queue: OperationReceiver, flush_interval: Duration) {
        let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(?flush_interval, percentiles = ?self.percentiles, "Aggregator started");

        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => self.flush(),
                op = queue.recv() => match op {
                    Some(op) => self.apply(op),
                    None => break,
                },
            }
        }

        if !self.window.is_empty() {
            self.flush();
        }
        tracing::info!("Ingestion queue closed, aggregator stopped");
    }

    /// Spawn [`run`](Self::run) onto the current runtime.
    pub fn spawn(self, queue: OperationReceiver, flush_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(self.run(queue, flush_interval))
    }
}
