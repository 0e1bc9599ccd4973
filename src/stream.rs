// SPDX-License-Identifier: Apache-2.0

//! The slice of the push/pull streaming protocol the operator speaks.
//!
//! A producer hands its consumer a [`DownstreamSubscription`] and then pushes
//! signals into the consumer's [`UpstreamListener`]. The consumer pulls with
//! `request(n)` and may `cancel()` at any time, from any thread.

use std::sync::Arc;

/// Consumer-side view of a producer: demand and cancellation.
///
/// Implementations must tolerate calls from several threads at once.
pub trait DownstreamSubscription: Send + Sync {
    /// Asks the producer for `n` more events.
    fn request(&self, n: u64);

    /// Tells the producer to stop. Repeated calls are no-ops.
    fn cancel(&self);
}

/// Capability handed over by an upstream producer when it binds.
pub type UpstreamHandle = Arc<dyn DownstreamSubscription>;

/// Receiver of the signals a producer pushes.
///
/// `on_next`, `on_error` and `on_complete` are never delivered concurrently
/// by a well-behaved producer. At most one of `on_error` / `on_complete` is
/// delivered.
pub trait UpstreamListener<T, E> {
    /// Bind handshake: the producer supplies its handle.
    fn on_subscribe(&self, handle: UpstreamHandle);

    /// One data event.
    fn on_next(&self, item: T);

    /// Terminal failure.
    fn on_error(&self, error: E);

    /// Terminal success.
    fn on_complete(&self);
}

impl<T, E, S: UpstreamListener<T, E> + ?Sized> UpstreamListener<T, E> for Arc<S> {
    fn on_subscribe(&self, handle: UpstreamHandle) {
        (**self).on_subscribe(handle)
    }

    fn on_next(&self, item: T) {
        (**self).on_next(item)
    }

    fn on_error(&self, error: E) {
        (**self).on_error(error)
    }

    fn on_complete(&self) {
        (**self).on_complete()
    }
}
