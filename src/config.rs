// SPDX-License-Identifier: Apache-2.0

//! Configuration shared by rate limiters that gate an operator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a caller waits for a permit before giving up.
const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(5);

/// Limiter settings the operator depends on.
///
/// Only the permit timeout is consumed here; how permits are refilled is
/// the limiter's own business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimiterConfig {
    /// How long a permit acquisition may block before it counts as denied.
    #[serde(default = "default_timeout_duration", with = "humantime_serde")]
    pub timeout_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            timeout_duration: DEFAULT_TIMEOUT_DURATION,
        }
    }
}

impl RateLimiterConfig {
    /// Set the permit timeout.
    #[must_use]
    pub fn with_timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }
}

fn default_timeout_duration() -> Duration {
    DEFAULT_TIMEOUT_DURATION
}
