//! Contention retry for store writes.
//!
//! The store may reject a write under concurrent load (serialization
//! failure, deadlock, lock timeout). Every write operation in this crate is
//! wrapped in [`with_contention_retry`], which retries the transaction with
//! exponential async backoff before surfacing the error to the caller.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use prospecta_core::{defaults, Error, Result};

/// Postgres SQLSTATEs treated as contention: serialization failure,
/// deadlock detected, lock not available.
const CONTENTION_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Whether an error is a contention-class store rejection worth retrying.
pub(crate) fn is_contention(err: &Error) -> bool {
    if let Error::Database(sqlx::Error::Database(db_err)) = err {
        if let Some(code) = db_err.code() {
            return CONTENTION_CODES.contains(&code.as_ref());
        }
    }
    false
}

/// Run a store write, retrying on contention with exponential backoff:
/// base 100 ms, doubling, up to [`defaults::CONTENTION_MAX_ATTEMPTS`]
/// attempts total. Non-contention errors surface immediately.
pub(crate) async fn with_contention_retry<T, F, Fut>(op: &'static str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(defaults::CONTENTION_BASE_DELAY_MS);
    let mut attempt: u32 = 1;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if is_contention(&err) && attempt < defaults::CONTENTION_MAX_ATTEMPTS => {
                warn!(
                    subsystem = "db",
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Store write contention, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_passes_through() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = with_contention_retry("test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_contention_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<()> = with_contention_retry("test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("boom".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plain_errors_are_not_contention() {
        assert!(!is_contention(&Error::Internal("x".to_string())));
        assert!(!is_contention(&Error::Database(sqlx::Error::RowNotFound)));
    }
}
