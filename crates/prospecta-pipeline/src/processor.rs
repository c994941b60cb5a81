//! Work unit processor: the per-item attempt loop.
//!
//! Owns the full lifecycle of one work item: mark it `processing`, call the
//! enricher up to `max_retries + 1` times with classified backoff between
//! attempts, and persist exactly one terminal outcome (`completed` or
//! `failed`) before returning.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use prospecta_core::{
    retry::{classify, BackoffPolicy},
    Enricher, EnrichmentRequest, WorkItem, WorkItemStore,
};

/// Terminal outcome of processing one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed,
    Failed,
}

/// Processes a single work item to a terminal state.
#[derive(Clone)]
pub struct WorkUnitProcessor {
    items: Arc<dyn WorkItemStore>,
    enricher: Arc<dyn Enricher>,
    policy: BackoffPolicy,
}

impl WorkUnitProcessor {
    pub fn new(
        items: Arc<dyn WorkItemStore>,
        enricher: Arc<dyn Enricher>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            items,
            enricher,
            policy,
        }
    }

    /// Process one item to completion or failure. Never returns an error:
    /// every path ends in a durable terminal status for the item, and store
    /// write failures degrade to `Failed` with a logged error.
    pub async fn process(&self, item: WorkItem) -> ItemOutcome {
        let start = Instant::now();
        let item_id = item.id;

        if let Err(e) = self.items.mark_processing(item_id).await {
            error!(
                subsystem = "pipeline",
                component = "processor",
                item_id = %item_id,
                error = %e,
                "Failed to mark item processing"
            );
            return self.fail_item(item_id, &format!("store error: {e}")).await;
        }

        let request = EnrichmentRequest {
            item_id,
            kind: self.enricher.kind(),
            payload: item.payload,
        };

        let mut last_error = String::new();
        for attempt in 0..self.policy.total_attempts() {
            match self.enricher.enrich(request.clone()).await {
                Ok(patch) => {
                    if let Err(e) = patch.validate() {
                        // A malformed patch is deterministic; retrying the
                        // same call would produce the same result.
                        warn!(
                            subsystem = "pipeline",
                            component = "processor",
                            item_id = %item_id,
                            error = %e,
                            "Enricher returned an invalid patch"
                        );
                        return self.fail_item(item_id, &format!("invalid patch: {e}")).await;
                    }
                    if let Err(e) = self.items.complete(item_id, patch).await {
                        error!(
                            subsystem = "pipeline",
                            component = "processor",
                            item_id = %item_id,
                            error = %e,
                            "Failed to persist completed item"
                        );
                        return self.fail_item(item_id, &format!("store error: {e}")).await;
                    }
                    debug!(
                        subsystem = "pipeline",
                        component = "processor",
                        item_id = %item_id,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Item completed"
                    );
                    return ItemOutcome::Completed;
                }
                Err(e) => {
                    let class = classify(&e);
                    last_error = e.to_string();

                    if attempt + 1 < self.policy.total_attempts() {
                        let delay = self.policy.delay_for(class, attempt);
                        warn!(
                            subsystem = "pipeline",
                            component = "processor",
                            item_id = %item_id,
                            attempt,
                            class = ?class,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Enrichment attempt failed, retrying"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            subsystem = "pipeline",
            component = "processor",
            item_id = %item_id,
            attempts = self.policy.total_attempts(),
            error = %last_error,
            "Retry budget exhausted, marking item failed"
        );
        self.fail_item(item_id, &last_error).await
    }

    /// Persist a failed status. The write itself is best-effort: if the
    /// store rejects it, crash recovery will pick the item up later.
    async fn fail_item(&self, item_id: uuid::Uuid, error_msg: &str) -> ItemOutcome {
        if let Err(e) = self.items.fail(item_id, error_msg).await {
            error!(
                subsystem = "pipeline",
                component = "processor",
                item_id = %item_id,
                error = %e,
                "Failed to persist failed item"
            );
        }
        ItemOutcome::Failed
    }
}
