//! Byte-string prefix tree
//!
//! This module implements the ordered prefix index backing the multiplexer.
//! Patterns are stored byte by byte in a tree; matching walks the tree
//! incrementally with whatever bytes have arrived so far, so a decision can
//! be made as soon as the stream has produced enough data.

use std::collections::BTreeMap;

/// A prefix tree mapping byte-string patterns to values.
///
/// Patterns are immutable once inserted; there is no removal. Inserting a
/// pattern that is already present replaces its value (last write wins).
#[derive(Debug)]
pub struct Trie<T> {
    root: Node<T>,
    len: usize,
    max_pattern_len: usize,
}

/// A node in the tree, used as the traversal cursor during matching.
#[derive(Debug)]
pub struct Node<T> {
    value: Option<T>,
    children: BTreeMap<u8, Node<T>>,
}

/// Result of advancing a cursor with a chunk of newly read bytes.
#[derive(Debug)]
pub struct Advance<'a, T> {
    /// Value of the deepest pattern end passed on the walked path, if any.
    ///
    /// This is not limited to the final position: a chunk that diverges
    /// from the tree mid-way still reports the last pattern end it walked
    /// through, so chunked delivery resolves the same way byte-at-a-time
    /// delivery would.
    pub value: Option<&'a T>,
    /// Cursor after consuming the whole chunk, or `None` once no registered
    /// pattern can be extended any further.
    pub next: Option<&'a Node<T>>,
    /// Whether the whole chunk is a valid continuation of at least one
    /// registered pattern.
    pub matched: bool,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> Trie<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            len: 0,
            max_pattern_len: 0,
        }
    }

    /// Insert a pattern, returning the previous value if the exact pattern
    /// was already registered.
    pub fn insert(&mut self, pattern: &[u8], value: T) -> Option<T> {
        let mut node = &mut self.root;
        for &byte in pattern {
            node = node.children.entry(byte).or_default();
        }

        let old = node.value.replace(value);
        if old.is_none() {
            self.len += 1;
            self.max_pattern_len = self.max_pattern_len.max(pattern.len());
        }
        old
    }

    /// Number of distinct registered patterns.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no patterns are registered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the longest registered pattern.
    ///
    /// Matching never needs to inspect more bytes than this.
    pub fn max_pattern_len(&self) -> usize {
        self.max_pattern_len
    }

    /// Traversal cursor positioned at the empty prefix.
    pub fn root(&self) -> &Node<T> {
        &self.root
    }
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Node<T> {
    /// Advance the cursor with a chunk of newly read bytes.
    pub fn advance<'a>(&'a self, chunk: &[u8]) -> Advance<'a, T> {
        let mut node = self;
        let mut value = None;

        for &byte in chunk {
            match node.children.get(&byte) {
                Some(child) => {
                    if child.value.is_some() {
                        value = child.value.as_ref();
                    }
                    node = child;
                }
                None => {
                    return Advance {
                        value,
                        next: None,
                        matched: false,
                    };
                }
            }
        }

        Advance {
            value,
            // A cursor with no children has nothing left to search.
            next: if node.children.is_empty() { None } else { Some(node) },
            matched: true,
        }
    }
}
