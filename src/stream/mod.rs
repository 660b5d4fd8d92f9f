//! Stream wrapper module
//!
//! This module provides the replay wrapper that hands bytes consumed during
//! protocol matching back to whatever reads from the connection next.

mod replay;

pub use replay::ReplayStream;
