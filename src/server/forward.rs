//! Forwarding handler
//!
//! This module provides the stock handler used by the portmux binary: it
//! connects a dispatched connection to a fixed backend address and relays
//! data in both directions. The replayed prefix reaches the backend first,
//! so the sniffing is invisible end to end.

use futures::future::BoxFuture;
use log::{debug, error};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::Result;
use crate::mux::Handler;
use crate::stream::ReplayStream;

/// Handler that forwards a dispatched connection to a backend service.
#[derive(Debug, Clone)]
pub struct Forwarder {
    /// Backend address to forward traffic to
    target: SocketAddr,
    /// Timeout for establishing the backend connection
    connect_timeout: Duration,
    /// Size of each relay buffer
    buffer_size: usize,
}

impl Forwarder {
    /// Create a forwarder with the given limits.
    pub fn new(target: SocketAddr, connect_timeout: Duration, buffer_size: usize) -> Self {
        Self {
            target,
            connect_timeout,
            buffer_size,
        }
    }

    /// Backend address this forwarder connects to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Handler<TcpStream> for Forwarder {
    fn serve(&self, stream: ReplayStream<TcpStream>) -> BoxFuture<'static, ()> {
        let target = self.target;
        let connect_timeout = self.connect_timeout;
        let buffer_size = self.buffer_size;

        Box::pin(async move {
            let target_stream = match timeout(connect_timeout, TcpStream::connect(target)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    error!("Failed to connect to {}: {}", target, e);
                    return;
                }
                Err(_) => {
                    error!("Connection to {} timed out", target);
                    return;
                }
            };

            debug!("Forwarding connection to {}", target);

            if let Err(e) = proxy_data(stream, target_stream, buffer_size).await {
                debug!("Forwarding to {} ended: {}", target, e);
            }
        })
    }
}

/// Forward data between two streams
///
/// # Parameters
///
/// * `client_stream` - Dispatched client stream (prefix replay included)
/// * `target_stream` - Backend TCP stream
/// * `buffer_size` - Size of each relay buffer
///
/// # Returns
///
/// Returns `Ok(())` when either direction closes.
pub async fn proxy_data<S>(
    client_stream: S,
    target_stream: TcpStream,
    buffer_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Use two tasks to handle bidirectional data flow simultaneously
    let (mut client_reader, mut client_writer) = tokio::io::split(client_stream);
    let (mut target_reader, mut target_writer) = tokio::io::split(target_stream);

    // Data flow from client to target
    let client_to_target = tokio::spawn(async move {
        let mut buffer = vec![0u8; buffer_size];
        let mut total_bytes = 0;

        loop {
            match client_reader.read(&mut buffer).await {
                Ok(0) => break, // Connection closed
                Ok(n) => {
                    total_bytes += n;
                    if target_writer.write_all(&buffer[..n]).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        debug!("Client to target transferred {} bytes total", total_bytes);
    });

    // Data flow from target to client
    let target_to_client = tokio::spawn(async move {
        let mut buffer = vec![0u8; buffer_size];
        let mut total_bytes = 0;

        loop {
            match target_reader.read(&mut buffer).await {
                Ok(0) => break, // Connection closed
                Ok(n) => {
                    total_bytes += n;
                    if client_writer.write_all(&buffer[..n]).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        debug!("Target to client transferred {} bytes total", total_bytes);
    });

    // Wait for either task to complete
    tokio::select! {
        _ = client_to_target => debug!("Client to target connection closed"),
        _ = target_to_client => debug!("Target to client connection closed"),
    }

    Ok(())
}
