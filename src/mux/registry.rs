//! Multiplexer registry and matching loop
//!
//! This module implements the heart of portmux: a registry mapping
//! byte-string prefixes to handlers, the incremental matching loop that
//! resolves a live stream against those prefixes, and the dispatch facade
//! that hands the connection off without losing the sniffed bytes.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::common::{MuxError, Result};
use crate::mux::Handler;
use crate::pattern::Trie;
use crate::stream::ReplayStream;

/// A resolved match: the handler to invoke and the bytes consumed from the
/// stream while deciding.
pub struct Match<S> {
    /// The handler the stream's prefix resolved to
    pub handler: Arc<dyn Handler<S>>,
    /// The exact byte sequence read from the stream during matching
    pub consumed: Bytes,
}

/// Protocol multiplexer over streams of type `S`.
///
/// Matches the leading bytes of each stream against registered prefixes and
/// dispatches to the handler of the longest matching one, falling back to a
/// `not_found` handler when nothing matches.
///
/// The lifecycle is two-phase: register everything first (`handle_prefix`,
/// `not_found` take `&mut self`), then share the multiplexer (typically as
/// `Arc<Mux<S>>`) and serve through `&self`. The borrow rules make
/// registration during serving impossible, so no locking is needed.
///
/// # Example
///
/// ```no_run
/// use portmux::mux::Mux;
/// use tokio::net::TcpStream;
///
/// # fn main() -> portmux::common::Result<()> {
/// use portmux::stream::ReplayStream;
///
/// let mut mux: Mux<TcpStream> = Mux::new();
/// mux.handle_prefix(
///     |stream: ReplayStream<TcpStream>| async move { drop(stream) },
///     ["SSH-2.0"],
/// )?;
/// mux.not_found(|stream: ReplayStream<TcpStream>| async move { drop(stream) });
/// let mux = std::sync::Arc::new(mux);
/// # Ok(())
/// # }
/// ```
pub struct Mux<S> {
    patterns: Trie<Arc<dyn Handler<S>>>,
    not_found: Option<Arc<dyn Handler<S>>>,
}

impl<S> Mux<S> {
    /// Create an empty multiplexer.
    pub fn new() -> Self {
        Self {
            patterns: Trie::new(),
            not_found: None,
        }
    }

    /// Set the handler invoked when no pattern matches.
    ///
    /// Last call wins.
    pub fn not_found(&mut self, handler: impl Handler<S> + 'static) {
        self.not_found = Some(Arc::new(handler));
    }

    /// Register one handler for a set of prefixes.
    ///
    /// Re-registering an exact pattern replaces its handler. Patterns must
    /// be non-empty; an empty pattern fails the whole call and registers
    /// nothing.
    pub fn handle_prefix<I>(&mut self, handler: impl Handler<S> + 'static, patterns: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let patterns: Vec<I::Item> = patterns.into_iter().collect();
        if patterns.iter().any(|p| p.as_ref().is_empty()) {
            return Err(MuxError::Pattern("pattern must not be empty".to_string()));
        }

        let handler: Arc<dyn Handler<S>> = Arc::new(handler);
        for pattern in &patterns {
            let pattern = pattern.as_ref();
            if self.patterns.insert(pattern, Arc::clone(&handler)).is_some() {
                debug!("replaced handler for pattern \"{}\"", pattern.escape_ascii());
            } else {
                trace!("registered pattern \"{}\"", pattern.escape_ascii());
            }
        }
        Ok(())
    }

    /// Number of distinct registered patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl<S> Default for Mux<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AsyncRead + Unpin> Mux<S> {
    /// Resolve a stream to a handler by reading its leading bytes.
    ///
    /// Reads at most `max_pattern_len` bytes, one read per loop iteration,
    /// advancing the index cursor with exactly what arrived; it stops as
    /// soon as further reads cannot change the outcome. The longest
    /// registered pattern that prefixes the observed bytes wins; with no
    /// match the fallback is used, and with no fallback the call fails with
    /// [`MuxError::NotFound`]. Either way the consumed bytes are surfaced:
    /// in the [`Match`] on success, via [`MuxError::consumed`] on failure.
    ///
    /// A zero-length read is treated as end-of-stream. End-of-stream (or a
    /// read error) before any byte arrived fails with [`MuxError::Read`];
    /// after at least one successful read it merely ends the loop, and
    /// resolution proceeds with whatever was observed.
    pub async fn resolve(&self, stream: &mut S) -> Result<Match<S>> {
        if self.patterns.is_empty() {
            return match &self.not_found {
                Some(handler) => Ok(Match {
                    handler: Arc::clone(handler),
                    consumed: Bytes::new(),
                }),
                None => Err(MuxError::NotFound { consumed: Bytes::new() }),
            };
        }

        // Bounds the bytes ever inspected: no pattern extends past this.
        let mut buf = vec![0u8; self.patterns.max_pattern_len()];
        let mut offset = 0;
        let mut cursor = Some(self.patterns.root());
        let mut matched: Option<&Arc<dyn Handler<S>>> = None;

        while let Some(node) = cursor {
            let n = match stream.read(&mut buf[offset..]).await {
                Ok(0) if offset == 0 => {
                    return Err(MuxError::Read {
                        consumed: Bytes::new(),
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "stream closed before any bytes arrived",
                        ),
                    });
                }
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if offset == 0 => {
                    return Err(MuxError::Read {
                        consumed: Bytes::new(),
                        source: e,
                    });
                }
                Err(e) => {
                    debug!("read failed after {} sniffed bytes, resolving with what arrived: {}", offset, e);
                    break;
                }
            };

            let adv = node.advance(&buf[offset..offset + n]);
            trace!("advanced {} bytes, continuation={}", n, adv.matched);
            if adv.value.is_some() {
                // A longer match overwrites an earlier one.
                matched = adv.value;
            }
            offset += n;
            cursor = adv.next;
        }

        buf.truncate(offset);
        let consumed = Bytes::from(buf);

        match matched.or(self.not_found.as_ref()) {
            Some(handler) => Ok(Match {
                handler: Arc::clone(handler),
                consumed,
            }),
            None => Err(MuxError::NotFound { consumed }),
        }
    }

    /// Resolve a stream and hand it to the matching handler.
    ///
    /// The handler receives the stream wrapped so the sniffed bytes replay
    /// before live data, and owns it from then on. If resolution fails the
    /// stream is dropped, and thereby closed, without invoking any handler.
    /// At most one handler ever runs per stream.
    pub async fn dispatch(&self, mut stream: S) {
        match self.resolve(&mut stream).await {
            Ok(Match { handler, consumed }) => {
                debug!("dispatching connection, {} bytes sniffed", consumed.len());
                handler.serve(ReplayStream::new(stream, consumed)).await;
            }
            Err(err) => {
                match &err {
                    MuxError::NotFound { consumed } => debug!(
                        "no handler matched (sniffed \"{}\"), closing connection",
                        consumed.escape_ascii()
                    ),
                    _ => warn!("closing connection: {}", err),
                }
                // Dropping the stream closes it.
            }
        }
    }
}
