//! Replay stream implementation
//!
//! This module implements the wrapper that makes protocol sniffing
//! transparent to handlers. Bytes consumed from a stream while matching are
//! handed back to the wrapper, which serves them to the first reads before
//! any further read touches the live stream.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// A stream that replays a consumed prefix before the live stream resumes.
///
/// Reads are satisfied from the prefix, in order and in full, until it is
/// exhausted; after that every operation delegates to the inner stream.
/// Writes always go straight through (sniffing never writes). Dropping the
/// wrapper drops, and thereby closes, the inner stream.
///
/// Reading from the wrapper reproduces exactly the byte sequence the
/// original stream would have produced had no matching occurred.
#[derive(Debug)]
pub struct ReplayStream<S> {
    inner: S,
    prefix: Bytes,
}

impl<S> ReplayStream<S> {
    /// Wrap a stream with a previously consumed prefix.
    ///
    /// An empty prefix is fine; the wrapper then behaves exactly like the
    /// inner stream.
    pub fn new(inner: S, prefix: Bytes) -> Self {
        Self { inner, prefix }
    }

    /// Number of prefix bytes not yet replayed.
    pub fn remaining(&self) -> usize {
        self.prefix.len()
    }

    /// Reference to the inner stream.
    ///
    /// Useful for operations the concrete stream type offers beyond
    /// reading and writing (peer address, socket options, ...).
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable reference to the inner stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap into the inner stream, discarding any unreplayed prefix.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl ReplayStream<TcpStream> {
    /// Peer address of the underlying TCP stream.
    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.peer_addr()
    }

    /// Local address of the underlying TCP stream.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ReplayStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix.split_to(n));
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ReplayStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
