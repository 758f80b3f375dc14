//! statsd over TCP, one task per connection.

use super::{trim_line, LineSink};
use crate::core::{Result, StatsvisError};
use std::net::SocketAddr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Accepts connections and reads newline separated lines from each.
pub struct TcpReceiver {
    listener: TcpListener,
    sink: LineSink,
    max_line: usize,
}

impl TcpReceiver {
    /// Bind `addr`. Lines longer than `max_line` bytes are discarded.
    pub async fn bind(addr: SocketAddr, sink: LineSink, max_line: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            StatsvisError::network(format!("statsd tcp listen on {}: {}", addr, e))
        })?;
        Ok(Self {
            listener,
            sink,
            max_line,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// Connection tasks live in a [`JoinSet`], so dropping this future
    /// aborts them and releases their queue senders.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "statsd TCP server started");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!(error = %e, "statsd tcp accept error");
                            return Err(e.into());
                        },
                    };

                    self.sink.monitor.record_connection();
                    let sink = self.sink.clone();
                    let max_line = self.max_line;
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, sink, max_line).await {
                            tracing::debug!(
                                %peer,
                                category = e.category(),
                                error = %e,
                                "statsd tcp connection ended"
                            );
                        }
                    });
                },
                // Reap finished connections.
                Some(_) = connections.join_next(), if !connections.is_empty() => {},
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    sink: LineSink,
    max_line: usize,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(256);

    loop {
        line.clear();
        // One byte past the cap tells an oversized line from one that fits.
        let limit = max_line as u64 + 1;
        if (&mut reader).take(limit).read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }

        if line.len() > max_line && line.last() != Some(&b'\n') {
            sink.reject_oversized(peer, max_line);
            discard_line(&mut reader).await?;
            continue;
        }

        let trimmed = trim_line(line.strip_suffix(b"\n").unwrap_or(&line));
        if !trimmed.is_empty() {
            sink.submit_line(trimmed, peer).await?;
        }
    }
}

/// Skip input up to and including the next newline, or to EOF.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            },
            None => {
                let len = buf.len();
                reader.consume(len);
            },
        }
    }
}
