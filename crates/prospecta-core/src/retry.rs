//! Pure retry/backoff policy for failed enrichment calls.
//!
//! Rate-limit failures back off exponentially; other transient failures wait
//! a flat base delay. The policy is pure logic — sleeping is the caller's
//! concern.

use std::time::Duration;

use crate::error::Error;

/// Classification of a failed enrichment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// External-service-imposed throttle; retried with exponential backoff.
    RateLimited,
    /// Network blip or temporary collaborator fault; retried with flat
    /// backoff. Anything not recognized as rate-limiting lands here.
    Transient,
}

/// Classify an error by its signal. Pure function: the explicit variant
/// wins, otherwise a "rate limit" / HTTP-429 marker in the message.
pub fn classify(err: &Error) -> ErrorClass {
    if matches!(err, Error::RateLimited(_)) {
        return ErrorClass::RateLimited;
    }
    let msg = err.to_string().to_lowercase();
    if msg.contains("rate limit") || msg.contains("429") {
        ErrorClass::RateLimited
    } else {
        ErrorClass::Transient
    }
}

/// Backoff policy for one work item's attempt loop.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    /// Total attempts a work item gets before being marked failed.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after the failure of attempt `attempt` (zero-based).
    ///
    /// Rate-limit: `base * 2^attempt`. Other transient: flat `base`.
    pub fn delay_for(&self, class: ErrorClass, attempt: u32) -> Duration {
        match class {
            ErrorClass::RateLimited => self.base_delay * 2u32.saturating_pow(attempt),
            ErrorClass::Transient => self.base_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_explicit_rate_limited() {
        let err = Error::RateLimited("try later".to_string());
        assert_eq!(classify(&err), ErrorClass::RateLimited);
    }

    #[test]
    fn test_classify_marker_in_message() {
        let err = Error::Enrichment("upstream says rate limit exceeded".to_string());
        assert_eq!(classify(&err), ErrorClass::RateLimited);

        let err = Error::Request("HTTP 429 Too Many Requests".to_string());
        assert_eq!(classify(&err), ErrorClass::RateLimited);
    }

    #[test]
    fn test_classify_other_is_transient() {
        let err = Error::Enrichment("connection reset by peer".to_string());
        assert_eq!(classify(&err), ErrorClass::Transient);

        let err = Error::Internal("boom".to_string());
        assert_eq!(classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let policy = BackoffPolicy::new(Duration::from_millis(1000), 3);
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimited, 0),
            Duration::from_millis(1000)
        );
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimited, 1),
            Duration::from_millis(2000)
        );
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimited, 2),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn test_transient_backoff_is_flat() {
        let policy = BackoffPolicy::new(Duration::from_millis(500), 3);
        for attempt in 0..4 {
            assert_eq!(
                policy.delay_for(ErrorClass::Transient, attempt),
                Duration::from_millis(500)
            );
        }
    }

    #[test]
    fn test_total_attempts() {
        assert_eq!(BackoffPolicy::new(Duration::ZERO, 0).total_attempts(), 1);
        assert_eq!(BackoffPolicy::new(Duration::ZERO, 3).total_attempts(), 4);
    }
}
