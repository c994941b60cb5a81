//! Pipeline configuration.
//!
//! Values are validated on construction: out-of-range or unparseable values
//! fall back to the documented default with a warning — never a crash at
//! startup.

use std::time::Duration;

use tracing::warn;

use crate::defaults;

/// Configuration for one job run. Fixed for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum work items processed simultaneously (1–10).
    pub concurrency: usize,
    /// Retries after the first enrichment attempt (0–10).
    pub max_retries: u32,
    /// Base delay between enrichment retries, in milliseconds.
    pub retry_delay_ms: u64,
    /// Delay between dispatched batches, in milliseconds (0 = none).
    pub batch_delay_ms: u64,
    /// Interval at which a paused job re-checks its pause flag.
    pub pause_poll_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            max_retries: defaults::MAX_RETRIES,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            batch_delay_ms: defaults::BATCH_DELAY_MS,
            pause_poll_ms: defaults::PAUSE_POLL_MS,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PROSPECTA_CONCURRENCY` | `3` | Concurrent work items per job (1–10) |
    /// | `PROSPECTA_MAX_RETRIES` | `3` | Retries per item (0–10) |
    /// | `PROSPECTA_RETRY_DELAY_MS` | `1000` | Base retry delay |
    /// | `PROSPECTA_BATCH_DELAY_MS` | `0` | Inter-batch delay |
    /// | `PROSPECTA_PAUSE_POLL_MS` | `3000` | Pause re-check interval |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PROSPECTA_CONCURRENCY") {
            match val.parse::<usize>() {
                Ok(n) => config.concurrency = n,
                Err(_) => warn!(value = %val, "Invalid PROSPECTA_CONCURRENCY, using default"),
            }
        }
        if let Ok(val) = std::env::var("PROSPECTA_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(n) => config.max_retries = n,
                Err(_) => warn!(value = %val, "Invalid PROSPECTA_MAX_RETRIES, using default"),
            }
        }
        if let Ok(val) = std::env::var("PROSPECTA_RETRY_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(n) => config.retry_delay_ms = n,
                Err(_) => warn!(value = %val, "Invalid PROSPECTA_RETRY_DELAY_MS, using default"),
            }
        }
        if let Ok(val) = std::env::var("PROSPECTA_BATCH_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(n) => config.batch_delay_ms = n,
                Err(_) => warn!(value = %val, "Invalid PROSPECTA_BATCH_DELAY_MS, using default"),
            }
        }
        if let Ok(val) = std::env::var("PROSPECTA_PAUSE_POLL_MS") {
            match val.parse::<u64>() {
                Ok(n) => config.pause_poll_ms = n,
                Err(_) => warn!(value = %val, "Invalid PROSPECTA_PAUSE_POLL_MS, using default"),
            }
        }

        config.sanitized()
    }

    /// Set the concurrency limit.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the base retry delay in milliseconds.
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set the inter-batch delay in milliseconds.
    pub fn with_batch_delay_ms(mut self, ms: u64) -> Self {
        self.batch_delay_ms = ms;
        self
    }

    /// Set the pause poll interval in milliseconds.
    pub fn with_pause_poll_ms(mut self, ms: u64) -> Self {
        self.pause_poll_ms = ms;
        self
    }

    /// Replace out-of-range values with their defaults, warning for each.
    pub fn sanitized(mut self) -> Self {
        if self.concurrency < defaults::CONCURRENCY_MIN
            || self.concurrency > defaults::CONCURRENCY_MAX
        {
            warn!(
                concurrency = self.concurrency,
                default = defaults::CONCURRENCY,
                "Concurrency out of range (1-10), using default"
            );
            self.concurrency = defaults::CONCURRENCY;
        }
        if self.max_retries > defaults::MAX_RETRIES_MAX {
            warn!(
                max_retries = self.max_retries,
                default = defaults::MAX_RETRIES,
                "Max retries out of range (0-10), using default"
            );
            self.max_retries = defaults::MAX_RETRIES;
        }
        self
    }

    /// How many pending items each batch fetch requests.
    pub fn batch_size(&self) -> i64 {
        (self.concurrency * defaults::BATCH_FETCH_FACTOR) as i64
    }

    /// Base retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Inter-batch delay, if any.
    pub fn batch_delay(&self) -> Option<Duration> {
        (self.batch_delay_ms > 0).then(|| Duration::from_millis(self.batch_delay_ms))
    }

    /// Pause re-check interval as a [`Duration`].
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}
