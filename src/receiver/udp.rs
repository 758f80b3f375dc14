//! statsd over UDP.

use super::LineSink;
use crate::core::{Result, StatsvisError};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Reads datagrams and hands them to a [`LineSink`].
pub struct UdpReceiver {
    socket: UdpSocket,
    sink: LineSink,
    buffer_size: usize,
}

impl UdpReceiver {
    pub async fn bind(addr: SocketAddr, sink: LineSink, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            StatsvisError::network(format!("statsd udp listen on {}: {}", addr, e))
        })?;
        Ok(Self {
            socket,
            sink,
            buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until a read error or until the ingestion queue closes.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "statsd UDP server started");

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (n, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::error!(error = %e, "statsd udp read error");
                    return Err(e.into());
                },
            };

            if n == 0 {
                tracing::debug!(%source, "statsd udp read 0 bytes");
                continue;
            }

            // Awaiting here while the queue is full is the backpressure point.
            self.sink.submit_buffer(&buf[..n], source).await?;
        }
    }
}
