//! Enrichment collaborator abstraction.
//!
//! The external research service is a black box to the pipeline: it takes a
//! work item's payload and either returns a mergeable [`EnrichmentPatch`],
//! fails transiently, or fails with a rate-limit signal. Concrete backends
//! live in `prospecta-enrich` (HTTP client, deterministic mock).

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EnrichmentPatch, JobKind};

/// One unit of work handed to the collaborator.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    /// The work item being enriched.
    pub item_id: Uuid,
    /// Pipeline variant; drives the collaborator's behavior.
    pub kind: JobKind,
    /// Domain payload, opaque to the pipeline.
    pub payload: JsonValue,
}

/// An external call that performs the research/categorization for one work
/// item. Errors must be classifiable as rate-limited vs other transient
/// (see [`crate::retry::classify`]).
#[async_trait]
pub trait Enricher: Send + Sync {
    /// The pipeline variant this enricher serves.
    fn kind(&self) -> JobKind;

    /// Enrich one work item. The pipeline imposes no timeout of its own on
    /// this call; a hang stalls one concurrency slot.
    async fn enrich(&self, req: EnrichmentRequest) -> Result<EnrichmentPatch>;
}
