// SPDX-License-Identifier: Apache-2.0

//! The permit source consumed by the operator.
//!
//! The operator never looks inside a limiter. It asks for one permit at a
//! time and treats a timeout exactly like a refusal.

use crate::config::RateLimiterConfig;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;

/// A named source of capacity permits.
pub trait RateLimiter: Send + Sync {
    /// Identifies the limiter in diagnostics and in [`Error::PermitDenied`].
    fn name(&self) -> &str;

    /// Settings for this limiter, including the permit timeout.
    fn config(&self) -> &RateLimiterConfig;

    /// Tries to take one permit, blocking for at most `timeout`.
    ///
    /// Returns `false` if no permit became available in time.
    fn try_acquire(&self, timeout: Duration) -> bool;

    /// Tries to take one permit using the configured timeout.
    fn acquire_permission(&self) -> bool {
        self.try_acquire(self.config().timeout_duration)
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn config(&self) -> &RateLimiterConfig {
        (**self).config()
    }

    fn try_acquire(&self, timeout: Duration) -> bool {
        (**self).try_acquire(timeout)
    }

    fn acquire_permission(&self) -> bool {
        (**self).acquire_permission()
    }
}

/// Checks that a limiter name is usable in diagnostics.
///
/// # Errors
///
/// Returns `Error::InvalidLimiterName` if the name is empty or blank.
pub fn validate_limiter_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidLimiterName {
            name: name.to_string(),
        });
    }
    Ok(())
}
