// SPDX-License-Identifier: Apache-2.0

//! Rate-limited stream operator.
//!
//! The operator sits between a producer and its consumer. It takes one
//! admission permit when the producer binds, which also pays for the first
//! event, and one permit per event after that. A refused permit cancels the
//! producer and ends the stream with [`Error::PermitDenied`].
//!
//! Signals may arrive on any thread. All shared state moves through single
//! atomic transitions; nothing here holds a lock across a call.

use crate::limiter::RateLimiter;
use crate::stream::{DownstreamSubscription, UpstreamHandle, UpstreamListener};
use crate::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

/// Outcome of the admission permit taken during the bind handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Permit {
    /// No bind has decided the admission permit yet.
    Pending = 0,
    /// The admission permit was granted.
    Acquired = 1,
    /// The admission permit was refused.
    Rejected = 2,
}

impl Permit {
    /// Returns true if the admission permit was granted.
    #[inline]
    pub fn is_acquired(self) -> bool {
        matches!(self, Permit::Acquired)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Permit::Acquired,
            2 => Permit::Rejected,
            _ => Permit::Pending,
        }
    }
}

/// Set-once cell for the admission decision.
#[derive(Debug)]
struct AtomicPermit(AtomicU8);

impl AtomicPermit {
    fn new() -> Self {
        Self(AtomicU8::new(Permit::Pending as u8))
    }

    fn load(&self) -> Permit {
        Permit::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `Pending` to `Acquired`. Only the first caller wins.
    fn claim(&self) -> bool {
        self.0
            .compare_exchange(
                Permit::Pending as u8,
                Permit::Acquired as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records that the claimed permit was refused by the limiter.
    fn reject(&self) {
        self.0.store(Permit::Rejected as u8, Ordering::Release);
    }
}

const UNBOUND: u8 = 0;
const BOUND: u8 = 1;
const CANCELLED: u8 = 2;

/// Set-once holder of the upstream handle, plus the cancelled flag.
///
/// The handle is published before `state` moves to `BOUND`, so whoever
/// observes `BOUND` can read it. Whichever side loses the race between a
/// bind and a cancel is the one that cancels the handle, so it happens once.
///
/// This is also what downstream receives as its subscription.
struct UpstreamSlot {
    handle: OnceLock<UpstreamHandle>,
    state: AtomicU8,
}

impl UpstreamSlot {
    fn new() -> Self {
        Self {
            handle: OnceLock::new(),
            state: AtomicU8::new(UNBOUND),
        }
    }

    /// Stores `handle` if none was stored before and the slot is not
    /// cancelled. A refused handle is cancelled.
    fn set_once(&self, handle: UpstreamHandle) -> bool {
        let retained = Arc::clone(&handle);
        if let Err(duplicate) = self.handle.set(handle) {
            duplicate.cancel();
            if !self.is_cancelled() {
                warn!("upstream bound twice, cancelling the duplicate handle");
            }
            return false;
        }

        match self
            .state
            .compare_exchange(UNBOUND, BOUND, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(_) => {
                trace!("bind after cancellation, cancelling upstream");
                retained.cancel();
                false
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }
}

impl DownstreamSubscription for UpstreamSlot {
    fn request(&self, n: u64) {
        if self.state.load(Ordering::Acquire) != BOUND {
            trace!(n, "demand dropped, upstream not bound or cancelled");
            return;
        }
        if let Some(handle) = self.handle.get() {
            handle.request(n);
        }
    }

    fn cancel(&self) {
        if self.state.swap(CANCELLED, Ordering::SeqCst) == BOUND {
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
        }
    }
}

/// Stream stage that forwards upstream signals only under a permit.
///
/// One instance serves one subscription. Upstream binds it with
/// [`UpstreamListener::on_subscribe`]; downstream drives it through the
/// [`DownstreamSubscription`] it receives in its own `on_subscribe`.
///
/// The downstream error type `E` carries both upstream failures, which pass
/// through untouched, and the locally produced [`Error::PermitDenied`].
pub struct RateLimitedOperator<L, D> {
    limiter: L,
    downstream: D,
    upstream: Arc<UpstreamSlot>,
    permit: AtomicPermit,
    first_event_consumed: AtomicBool,
    terminated: AtomicBool,
}

impl<L: RateLimiter, D> RateLimitedOperator<L, D> {
    /// Creates an unbound operator that will deliver to `downstream`.
    pub fn new(limiter: L, downstream: D) -> Self {
        Self {
            limiter,
            downstream,
            upstream: Arc::new(UpstreamSlot::new()),
            permit: AtomicPermit::new(),
            first_event_consumed: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    /// The limiter gating this operator.
    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// Current admission decision.
    pub fn permit(&self) -> Permit {
        self.permit.load()
    }

    /// Returns true once the stream was cancelled, by downstream or by a
    /// refused permit.
    pub fn is_cancelled(&self) -> bool {
        self.upstream.is_cancelled()
    }

    /// Decides the admission permit. Concurrent callers other than the
    /// first see `false` without touching the limiter.
    fn acquire_call_permit(&self) -> bool {
        if !self.permit.claim() {
            return false;
        }
        let permitted = self.limiter.acquire_permission();
        if !permitted {
            self.permit.reject();
        }
        permitted
    }

    fn is_invocation_permitted(&self) -> bool {
        !self.upstream.is_cancelled()
            && !self.terminated.load(Ordering::Acquire)
            && self.permit.load().is_acquired()
    }

    /// Claims the right to send the single terminal signal.
    fn try_terminate(&self) -> bool {
        !self.terminated.swap(true, Ordering::AcqRel)
    }

    fn permit_denied(&self) -> Error {
        Error::permit_denied(self.limiter.name())
    }
}

impl<T, E, L, D> UpstreamListener<T, E> for RateLimitedOperator<L, D>
where
    L: RateLimiter,
    D: UpstreamListener<T, E>,
    E: From<Error>,
{
    fn on_subscribe(&self, handle: UpstreamHandle) {
        if !self.upstream.set_once(handle) {
            return;
        }

        let ack: UpstreamHandle = self.upstream.clone();
        if self.acquire_call_permit() {
            self.downstream.on_subscribe(ack);
        } else {
            debug!(limiter = %self.limiter.name(), "admission permit denied");
            self.upstream.cancel();
            self.downstream.on_subscribe(ack);
            if self.try_terminate() {
                self.downstream.on_error(E::from(self.permit_denied()));
            }
        }
    }

    fn on_next(&self, item: T) {
        if !self.is_invocation_permitted() {
            trace!(limiter = %self.limiter.name(), "event dropped after termination");
            return;
        }

        let first = !self.first_event_consumed.swap(true, Ordering::AcqRel);
        if first || self.limiter.acquire_permission() {
            self.downstream.on_next(item);
        } else {
            debug!(limiter = %self.limiter.name(), "event permit denied, cancelling upstream");
            self.upstream.cancel();
            if self.try_terminate() {
                self.downstream.on_error(E::from(self.permit_denied()));
            }
        }
    }

    fn on_error(&self, error: E) {
        if self.is_invocation_permitted() && self.try_terminate() {
            self.downstream.on_error(error);
        } else {
            trace!(limiter = %self.limiter.name(), "upstream error suppressed");
        }
    }

    fn on_complete(&self) {
        if self.is_invocation_permitted() && self.try_terminate() {
            self.downstream.on_complete();
        } else {
            trace!(limiter = %self.limiter.name(), "upstream completion suppressed");
        }
    }
}

impl<L, D> DownstreamSubscription for RateLimitedOperator<L, D>
where
    L: RateLimiter,
    D: Send + Sync,
{
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.cancel();
    }
}

impl<L: RateLimiter, D> fmt::Debug for RateLimitedOperator<L, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedOperator")
            .field("limiter", &self.limiter.name())
            .field("permit", &self.permit.load())
            .field("cancelled", &self.upstream.is_cancelled())
            .field("terminated", &self.terminated.load(Ordering::Acquire))
            .finish()
    }
}
