//! statsd network receivers.
//!
//! Both transports split their input into lines, run each line through the
//! parser and push accepted operations onto the bounded ingestion queue.
//! A full queue makes `send` wait, which stalls the reading task: for TCP
//! that stalls the connection, for UDP the kernel drops datagrams instead.

pub mod tcp;
pub mod udp;

use crate::core::config::ServerConfig;
use crate::core::{Result, StatsvisError};
use crate::metrics::{parse_line, OperationSender};
use crate::monitoring::Monitor;
use std::net::SocketAddr;
use std::sync::Arc;

pub use tcp::TcpReceiver;
pub use udp::UdpReceiver;

/// Parses raw lines and feeds the ingestion queue.
#[derive(Clone)]
pub struct LineSink {
    queue: OperationSender,
    monitor: Arc<Monitor>,
}

impl LineSink {
    pub fn new(queue: OperationSender, monitor: Arc<Monitor>) -> Self {
        Self { queue, monitor }
    }

    /// Parse one line and queue the resulting operation.
    ///
    /// Rejected lines are logged and dropped. Only a closed queue is an
    /// error.
    pub async fn submit_line(&self, line: &[u8], source: SocketAddr) -> Result<()> {
        self.monitor.record_line();

        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(e) => {
                self.monitor.record_rejected();
                tracing::warn!(%source, error = %e, "Bad line: not valid UTF-8");
                return Ok(());
            },
        };

        match parse_line(text) {
            Ok(op) => {
                self.queue.send(op).await.map_err(|_| StatsvisError::QueueClosed)?;
                self.monitor.record_queued();
            },
            Err(e) => {
                self.monitor.record_rejected();
                tracing::warn!(%source, line = text, error = %e, "Bad line");
            },
        }

        Ok(())
    }

    /// Count and log a line dropped for exceeding `max_line` bytes.
    pub fn reject_oversized(&self, source: SocketAddr, max_line: usize) {
        self.monitor.record_line();
        self.monitor.record_rejected();
        tracing::warn!(%source, max_line, "Bad line: longer than the line limit");
    }

    /// Submit every line of a buffer that may hold several `\n` separated
    /// lines. Trailing `\r` is stripped and empty lines are skipped.
    pub async fn submit_buffer(&self, buf: &[u8], source: SocketAddr) -> Result<()> {
        if !buf.contains(&b'\n') {
            // Typical single-line datagram.
            return self.submit_line(trim_line(buf), source).await;
        }

        for line in buf.split(|&b| b == b'\n') {
            let line = trim_line(line);
            if !line.is_empty() {
                self.submit_line(line, source).await?;
            }
        }
        Ok(())
    }
}

/// Strip a trailing carriage return.
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Both statsd listeners, bound and ready to run.
pub struct StatsdReceiver {
    udp: UdpReceiver,
    tcp: TcpReceiver,
}

impl StatsdReceiver {
    /// Bind the UDP and TCP listeners from `config`.
    pub async fn bind(config: &ServerConfig, sink: LineSink) -> Result<Self> {
        let udp = UdpReceiver::bind(config.statsd_udp, sink.clone(), config.max_datagram_size).await?;
        let tcp = TcpReceiver::bind(config.statsd_tcp, sink, config.max_datagram_size).await?;
        Ok(Self { udp, tcp })
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Run both listeners until one of them stops.
    ///
    /// Both run inside this future; dropping it closes the sockets and
    /// every queue sender they hold.
    pub async fn run(self) -> Result<()> {
        let result = tokio::select! {
            result = self.udp.run() => {
                tracing::warn!("statsd UDP receiver stopped");
                result
            }
            result = self.tcp.run() => {
                tracing::warn!("statsd TCP receiver stopped");
                result
            }
        };

        if let Err(e) = &result {
            tracing::error!(category = e.category(), error = %e, "statsd receiver failed");
        }
        result
    }
}
