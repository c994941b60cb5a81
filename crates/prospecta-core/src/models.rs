//! Core data model for the enrichment pipeline.
//!
//! The pipeline only reads and writes `status`, `error_message`, and
//! `processed_at` on a work item; the domain payload (company or contact
//! fields) rides through opaquely as JSON and is only touched by the
//! enrichment collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle state of an enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    /// Also used for "cancelled": an explicit cancel forces a job here.
    Failed,
}

impl JobStatus {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the database string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Whether this status is terminal. Terminal jobs are only left via the
    /// explicit reset-for-reprocessing operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Lifecycle state of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the database string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// The pipeline variant a job runs. One generic batch runner serves all
/// five; the kind selects the enricher and the backing item store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// General account research
    Research,
    /// Account categorization
    Categorize,
    /// Account preprocessing/validation
    Preprocess,
    /// Account triage scoring
    Triage,
    /// Prospect (contact) enrichment
    ProspectEnrich,
}

impl JobKind {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Categorize => "categorize",
            Self::Preprocess => "preprocess",
            Self::Triage => "triage",
            Self::ProspectEnrich => "prospect_enrich",
        }
    }

    /// Parse from the database string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "categorize" => Self::Categorize,
            "preprocess" => Self::Preprocess,
            "triage" => Self::Triage,
            "prospect_enrich" => Self::ProspectEnrich,
            _ => Self::Research,
        }
    }

    /// Whether this kind operates on prospects rather than accounts.
    pub fn targets_prospects(&self) -> bool {
        matches!(self, Self::ProspectEnrich)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of work items submitted together, tracked as one unit with
/// aggregate progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Number of items attached at creation.
    pub total: i64,
    /// Items that reached `completed`. Invariant:
    /// `processed_count + failed_count <= total`.
    pub processed_count: i64,
    /// Items that exhausted their retry budget.
    pub failed_count: i64,
    /// Advisory pointer to the item currently being reported on. Not
    /// authoritative; item status columns are.
    pub current_item_id: Option<Uuid>,
    /// Independent of `status`: a paused job stops dispatching new work but
    /// lets in-flight work finish.
    pub paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The smallest unit of processing (one account or prospect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    /// Owning job; nullable so an item can outlive a reset job.
    pub job_id: Option<Uuid>,
    pub status: ItemStatus,
    /// Set only when `status == Failed`.
    pub error_message: Option<String>,
    /// Set when entering `completed` or `failed`.
    pub processed_at: Option<DateTime<Utc>>,
    /// Domain payload, opaque to the pipeline.
    pub payload: JsonValue,
}

/// Request for creating a new job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub kind: JobKind,
    pub total: i64,
}

/// Explicit patch of enrichment output, merged onto a work item's domain
/// fields by the store. All fields optional; validated before any write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentPatch {
    /// Raw research payload from the collaborator.
    pub research: Option<JsonValue>,
    /// Assigned category.
    pub category: Option<String>,
    /// Assigned tags.
    pub tags: Option<Vec<String>>,
    /// Human-readable summary.
    pub summary: Option<String>,
}

impl EnrichmentPatch {
    /// Whether the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.research.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.summary.is_none()
    }

    /// Validate the patch before it is turned into a store write.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidInput(
                "enrichment patch carries no fields".to_string(),
            ));
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(Error::InvalidInput("empty category".to_string()));
            }
        }
        if let Some(tags) = &self.tags {
            if tags.iter().any(|t| t.trim().is_empty()) {
                return Err(Error::InvalidInput("empty tag".to_string()));
            }
        }
        Ok(())
    }
}

/// Aggregate work item counts, for operator dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}
