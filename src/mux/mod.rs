//! Protocol multiplexer module
//!
//! This module implements the core of portmux: handler registration,
//! incremental longest-prefix matching against a live stream, and dispatch
//! of the connection to the winning handler with the sniffed bytes
//! replayed.

mod handler;
mod registry;

pub use handler::Handler;
pub use registry::{Match, Mux};
