// SPDX-License-Identifier: Apache-2.0

//! Errors for the rate limit operator crate.

/// Errors produced by the rate-limited operator and its configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The rate limiter refused a permit, either at bind time or for an
    /// individual event. A timeout while waiting is reported the same way.
    #[error("Request not permitted for limiter: {limiter_name}")]
    PermitDenied {
        /// Name of the limiter that refused the permit.
        limiter_name: String,
    },

    /// The limiter name is invalid (empty or only whitespace).
    #[error("Invalid limiter name: {name:?}. Name must not be empty.")]
    InvalidLimiterName {
        /// The rejected name.
        name: String,
    },
}

impl Error {
    /// Builds a permit denial for the named limiter.
    pub fn permit_denied(limiter_name: impl Into<String>) -> Self {
        Self::PermitDenied {
            limiter_name: limiter_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_denied_message() {
        let err = Error::permit_denied("backend");
        assert_eq!(
            err.to_string(),
            "Request not permitted for limiter: backend"
        );
        assert!(matches!(err, Error::PermitDenied { ref limiter_name } if limiter_name == "backend"));
    }

    #[test]
    fn test_invalid_name_message() {
        let err = Error::InvalidLimiterName {
            name: "  ".to_string(),
        };
        assert!(err.to_string().contains("must not be empty"));
    }
}
