//! Server module
//!
//! This module implements the accept loop that feeds the multiplexer:
//! it listens on a single address and hands every accepted connection to
//! `Mux::dispatch` on its own task. The multiplexer itself spawns no
//! concurrency; this is the external acceptor the core expects.

use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::common::{MuxError, Result};
use crate::config::{parse_pattern, MuxConfig};
use crate::mux::Mux;

mod forward;

pub use forward::{proxy_data, Forwarder};

/// Build a ready-to-serve multiplexer from a validated configuration.
///
/// Every route becomes a [`Forwarder`] registered for its patterns; the
/// fallback target, when configured, becomes the `not_found` handler.
pub fn build_mux(config: &MuxConfig) -> Result<Mux<TcpStream>> {
    let connect_timeout = Duration::from_secs(config.connect_timeout);
    let mut mux = Mux::new();

    for route in &config.routes {
        let patterns = route
            .patterns
            .iter()
            .map(|p| parse_pattern(p))
            .collect::<Result<Vec<_>>>()?;

        let forwarder = Forwarder::new(route.target, connect_timeout, config.buffer_size);
        mux.handle_prefix(forwarder, patterns)?;
    }

    if let Some(target) = config.fallback {
        mux.not_found(Forwarder::new(target, connect_timeout, config.buffer_size));
    }

    Ok(mux)
}

/// Multiplexing server
///
/// Accepts connections on a single listen address and dispatches each one
/// through a shared, fully configured [`Mux`].
pub struct Server {
    /// Listen address for the server
    listen_addr: SocketAddr,
    /// Configured multiplexer, shared across connection tasks
    mux: Arc<Mux<TcpStream>>,
}

impl Server {
    /// Create a new server instance
    ///
    /// # Parameters
    ///
    /// * `listen_addr` - Listen address
    /// * `mux` - Fully configured multiplexer
    pub fn new(listen_addr: impl Into<SocketAddr>, mux: Arc<Mux<TcpStream>>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            mux,
        }
    }

    /// Start the server
    ///
    /// Listens for connections and dispatches them until an error occurs.
    /// This is a blocking method.
    ///
    /// # Errors
    ///
    /// Returns an error if it cannot bind to the listen address.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr).await.map_err(MuxError::Io)?;

        info!(
            "portmux listening on {} ({} patterns registered)",
            self.listen_addr,
            self.mux.pattern_count()
        );

        // One dispatch task per accepted connection
        let mut tasks = JoinSet::new();

        loop {
            // Reap finished tasks and log any panics
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Task error: {}", e);
                }
            }

            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Accepted connection from {}", peer_addr);

                    let mux = Arc::clone(&self.mux);
                    tasks.spawn(async move {
                        mux.dispatch(stream).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
