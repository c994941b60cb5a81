//! Mock enricher for deterministic testing.
//!
//! Outcomes can be scripted per item: each call pops the next scripted
//! outcome for that item, falling back to the default patch when the script
//! is exhausted or absent. The mock also records a call log and tracks the
//! peak number of concurrent in-flight calls, which lets tests assert both
//! retry sequences and concurrency bounds.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use prospecta_core::{Enricher, EnrichmentPatch, EnrichmentRequest, Error, JobKind, Result};

/// One scripted outcome for a mock enrichment call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this patch.
    Success(EnrichmentPatch),
    /// Fail with [`Error::RateLimited`].
    RateLimited,
    /// Fail with [`Error::Enrichment`] (classified as transient).
    Transient,
}

/// Record of one call the mock received.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub item_id: Uuid,
    pub kind: JobKind,
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<Uuid, VecDeque<MockOutcome>>,
    calls: Vec<MockCall>,
}

/// Mock [`Enricher`] for tests.
#[derive(Clone)]
pub struct MockEnricher {
    kind: JobKind,
    default_patch: EnrichmentPatch,
    latency: Option<Duration>,
    state: Arc<Mutex<MockState>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockEnricher {
    /// Create a mock that succeeds every call with a stock patch.
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            default_patch: EnrichmentPatch {
                research: Some(serde_json::json!({"source": "mock"})),
                category: None,
                tags: None,
                summary: Some("Mock enrichment".to_string()),
            },
            latency: None,
            state: Arc::new(Mutex::new(MockState::default())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the patch returned when no script applies.
    pub fn with_default_patch(mut self, patch: EnrichmentPatch) -> Self {
        self.default_patch = patch;
        self
    }

    /// Set simulated latency for every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script the outcomes of successive calls for one item.
    pub fn script(&self, item_id: Uuid, outcomes: impl IntoIterator<Item = MockOutcome>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripts
            .entry(item_id)
            .or_default()
            .extend(outcomes);
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Total number of calls received.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Number of calls received for one item.
    pub fn calls_for(&self, item_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.item_id == item_id)
            .count()
    }

    /// Peak number of concurrent in-flight calls observed.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, item_id: Uuid) -> Option<MockOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall {
            item_id,
            kind: self.kind,
        });
        state.scripts.get_mut(&item_id).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn enrich(&self, req: EnrichmentRequest) -> Result<EnrichmentPatch> {
        let outcome = self.next_outcome(req.item_id);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Some(MockOutcome::Success(patch)) => Ok(patch),
            Some(MockOutcome::RateLimited) => {
                Err(Error::RateLimited("mock rate limit".to_string()))
            }
            Some(MockOutcome::Transient) => {
                Err(Error::Enrichment("mock transient failure".to_string()))
            }
            None => Ok(self.default_patch.clone()),
        }
    }
}
