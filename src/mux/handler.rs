//! Connection handler trait
//!
//! This module defines the single capability a protocol handler needs:
//! take ownership of a byte stream. Handlers are registered on the
//! multiplexer as trait objects, so anything from a plain closure to a
//! full protocol server can be plugged in.

use std::future::Future;

use futures::future::BoxFuture;

use crate::stream::ReplayStream;

/// A protocol handler: accepts a byte stream and takes ownership of it.
///
/// The stream handed to `serve` replays any bytes consumed during matching
/// before live data resumes, so the handler sees exactly the byte sequence
/// the client sent. The handler owns the stream from this point on; the
/// multiplexer never touches it again.
pub trait Handler<S>: Send + Sync {
    /// Serve a dispatched connection.
    fn serve(&self, stream: ReplayStream<S>) -> BoxFuture<'static, ()>;
}

/// Plain async closures are handlers.
impl<S, F, Fut> Handler<S> for F
where
    F: Fn(ReplayStream<S>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn serve(&self, stream: ReplayStream<S>) -> BoxFuture<'static, ()> {
        Box::pin(self(stream))
    }
}
