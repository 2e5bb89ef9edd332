//! Error type used by the router, its pipeline and its subscribers.
//!
//! [`RouteError`] covers three families:
//!
//! - **Usage errors** raised by the router itself: publishing on a disposed
//!   router, removing a slot that was never filled, consuming a recycled
//!   fan-out source.
//! - **Faults** reported by subscribers and interceptors ([`RouteError::Failed`]).
//! - **Cancellation** ([`RouteError::Canceled`]), kept distinct from faults so
//!   callers and ordering policies can tell "was cancelled" from "failed".
//!
//! The helper methods (`as_label`, `as_message`) mirror each other and are meant
//! for logs/metrics.

use thiserror::Error;

/// # Errors produced while routing a command.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The router was disposed; no further publishes are accepted.
    #[error("router disposed")]
    Disposed,

    /// A registry slot was addressed that holds no entry.
    #[error("slot {index} not found")]
    SlotNotFound {
        /// The slot index that was addressed.
        index: usize,
    },

    /// The dispatch observed its cancellation signal.
    #[error("dispatch cancelled")]
    Canceled,

    /// A subscriber or interceptor reported a failure.
    #[error("dispatch failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// A fan-out source was polled with a generation token it no longer owns.
    #[error("stale fan-out source: expected generation {expected}, current {current}")]
    StaleSource {
        /// Generation captured by the consumer.
        expected: u64,
        /// Generation currently held by the pooled instance.
        current: u64,
    },
}

impl RouteError {
    /// Builds a [`RouteError::Failed`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use cmdrouter::RouteError;
    ///
    /// let err = RouteError::failed("connection refused");
    /// assert_eq!(err.to_string(), "dispatch failed: connection refused");
    /// ```
    pub fn failed(error: impl std::fmt::Display) -> Self {
        RouteError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cmdrouter::RouteError;
    ///
    /// assert_eq!(RouteError::Canceled.as_label(), "route_canceled");
    /// assert_eq!(RouteError::SlotNotFound { index: 3 }.as_label(), "route_slot_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RouteError::Disposed => "route_disposed",
            RouteError::SlotNotFound { .. } => "route_slot_not_found",
            RouteError::Canceled => "route_canceled",
            RouteError::Failed { .. } => "route_failed",
            RouteError::StaleSource { .. } => "route_stale_source",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RouteError::Disposed => "router disposed".to_string(),
            RouteError::SlotNotFound { index } => format!("slot not found: {index}"),
            RouteError::Canceled => "dispatch cancelled".to_string(),
            RouteError::Failed { error } => format!("error: {error}"),
            RouteError::StaleSource { expected, current } => {
                format!("stale source: generation {expected} != {current}")
            }
        }
    }

    /// Indicates whether this error is the cancellation kind.
    ///
    /// # Example
    /// ```
    /// use cmdrouter::RouteError;
    ///
    /// assert!(RouteError::Canceled.is_canceled());
    /// assert!(!RouteError::failed("boom").is_canceled());
    /// ```
    pub fn is_canceled(&self) -> bool {
        matches!(self, RouteError::Canceled)
    }

    /// Indicates whether this error is a caller mistake rather than a runtime fault.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            RouteError::Disposed | RouteError::SlotNotFound { .. } | RouteError::StaleSource { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_distinct() {
        let all = [
            RouteError::Disposed,
            RouteError::SlotNotFound { index: 0 },
            RouteError::Canceled,
            RouteError::failed("x"),
            RouteError::StaleSource {
                expected: 1,
                current: 2,
            },
        ];
        let mut labels: Vec<_> = all.iter().map(RouteError::as_label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), all.len());
    }

    #[test]
    fn test_cancellation_is_not_a_usage_error() {
        assert!(RouteError::Canceled.is_canceled());
        assert!(!RouteError::Canceled.is_usage());
        assert!(RouteError::Disposed.is_usage());
        assert!(!RouteError::failed("boom").is_usage());
    }
}
