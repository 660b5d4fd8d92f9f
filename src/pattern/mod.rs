//! Pattern index module
//!
//! This module provides the prefix index that stores registered byte-string
//! patterns and answers incremental "match as many leading bytes as
//! currently available" queries for the multiplexer.

mod trie;

pub use trie::{Advance, Node, Trie};
