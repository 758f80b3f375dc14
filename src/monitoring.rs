//! Pipeline counters for operational visibility.
//!
//! Receivers and the aggregator bump these lock-free counters; the health
//! endpoint reads them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Lines handed to the parser
    pub lines_received: u64,
    /// Lines rejected by the parser
    pub lines_rejected: u64,
    /// Operations accepted onto the ingestion queue
    pub operations_queued: u64,
    /// Windows flushed into the store
    pub flushes: u64,
    /// TCP connections accepted
    pub tcp_connections: u64,
}

/// Shared pipeline counters.
#[derive(Debug)]
pub struct Monitor {
    started: Instant,
    lines_received: AtomicU64,
    lines_rejected: AtomicU64,
    operations_queued: AtomicU64,
    flushes: AtomicU64,
    tcp_connections: AtomicU64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            lines_received: AtomicU64::new(0),
            lines_rejected: AtomicU64::new(0),
            operations_queued: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            tcp_connections: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.lines_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_queued(&self) {
        self.operations_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.tcp_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
            operations_queued: self.operations_queued.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            tcp_connections: self.tcp_connections.load(Ordering::Relaxed),
        }
    }
}
