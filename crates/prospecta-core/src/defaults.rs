//! Centralized default constants for the prospecta pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// PIPELINE
// =============================================================================

/// Default number of work items processed concurrently within one job run.
pub const CONCURRENCY: usize = 3;

/// Minimum allowed concurrency.
pub const CONCURRENCY_MIN: usize = 1;

/// Maximum allowed concurrency.
pub const CONCURRENCY_MAX: usize = 10;

/// How many pending items a batch fetch requests, as a multiple of the
/// concurrency limit. The scheduler never queues more than one batch ahead.
pub const BATCH_FETCH_FACTOR: usize = 2;

/// Default maximum retry count for a failed enrichment call.
pub const MAX_RETRIES: u32 = 3;

/// Maximum allowed retry count.
pub const MAX_RETRIES_MAX: u32 = 10;

/// Default base delay between enrichment retries in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Default delay between dispatched batches in milliseconds (0 = none).
pub const BATCH_DELAY_MS: u64 = 0;

/// Interval at which a paused job re-checks its pause flag, in milliseconds.
pub const PAUSE_POLL_MS: u64 = 3000;

// =============================================================================
// DURABLE STORE
// =============================================================================

/// Base delay before retrying a write rejected under contention, in
/// milliseconds. Doubles on each attempt.
pub const CONTENTION_BASE_DELAY_MS: u64 = 100;

/// Maximum attempts for a contended store write before surfacing the error.
pub const CONTENTION_MAX_ATTEMPTS: u32 = 5;

// =============================================================================
// RESEARCH SERVICE
// =============================================================================

/// Default research service base URL.
pub const RESEARCH_SERVICE_URL: &str = "http://127.0.0.1:8750";

/// Default HTTP request timeout for enrichment calls, in seconds. The
/// pipeline itself imposes no timeout; this is the only guard against a
/// hung collaborator.
pub const ENRICH_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_default_within_bounds() {
        const {
            assert!(CONCURRENCY >= CONCURRENCY_MIN);
            assert!(CONCURRENCY <= CONCURRENCY_MAX);
        }
    }

    #[test]
    fn retries_default_within_bounds() {
        const {
            assert!(MAX_RETRIES <= MAX_RETRIES_MAX);
        }
    }

    #[test]
    fn contention_retry_is_bounded() {
        const {
            assert!(CONTENTION_MAX_ATTEMPTS >= 1);
            assert!(CONTENTION_BASE_DELAY_MS > 0);
        }
    }
}
