//! Portmux: connection-level protocol multiplexer
//!
//! This library lets a single listening socket serve several incompatible
//! wire protocols. Each accepted connection's leading bytes are matched
//! against registered byte-string prefixes; the handler of the longest
//! matching prefix receives the connection with the inspected bytes
//! replayed, so the sniffing is invisible downstream.
//!
//! # Main Features
//!
//! - Incremental longest-prefix matching that never reads further than the
//!   longest registered pattern and never waits once the outcome is fixed
//! - Transparent replay of sniffed bytes to the winning handler
//! - Optional fallback handler for unmatched connections
//! - A ready-made accept loop and TCP forwarding handler for the common
//!   "route protocols to backends" deployment
//!
//! # Example
//!
//! ```no_run
//! use portmux::mux::Mux;
//! use portmux::server::{Forwarder, Server};
//! use portmux::Result;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut mux = Mux::new();
//!
//!     // SSH and TLS on the same port, everything else to a web server.
//!     mux.handle_prefix(
//!         Forwarder::new("127.0.0.1:22".parse().unwrap(), Duration::from_secs(30), 8192),
//!         ["SSH-2.0"],
//!     )?;
//!     mux.handle_prefix(
//!         Forwarder::new("127.0.0.1:443".parse().unwrap(), Duration::from_secs(30), 8192),
//!         [&b"\x16\x03"[..]],
//!     )?;
//!     mux.not_found(Forwarder::new(
//!         "127.0.0.1:80".parse().unwrap(),
//!         Duration::from_secs(30),
//!         8192,
//!     ));
//!
//!     let server = Server::new("0.0.0.0:7000".parse::<std::net::SocketAddr>().unwrap(), Arc::new(mux));
//!     server.run().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod mux;
pub mod pattern;
pub mod server;
pub mod stream;

// Re-export commonly used structures and functions for convenience
pub use common::{parse_socket_addr, MuxError, Result};
pub use mux::{Handler, Match, Mux};
pub use server::Server;
pub use stream::ReplayStream;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
