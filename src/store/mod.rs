//! Outcome store — persistence for per-round dispatch results.
//!
//! The store owns every `OutcomeRecord` once written; the pipeline only
//! holds a transient copy while deciding. Records are created on first
//! encounter of an idempotency key and updated in place afterwards,
//! never deleted.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Closed outcome status written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Sent,
    Failed,
    Queued,
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Queued => "queued",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted representation of one round unit's processing result.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub company: String,
    pub interviewer: String,
    pub interviewer_email: String,
    pub candidate: String,
    pub candidate_email: String,
    pub round_name: String,
    pub round_link: Option<String>,
    pub added_on: DateTime<Utc>,
    pub status: OutcomeStatus,
    pub failure_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub tat_seconds: Option<i64>,
    pub processed: bool,
    pub idempotency_key: String,
}

/// Persistence seam for dispatch outcomes.
///
/// `find_by_key` returning `Ok(None)` covers both "no record" and "the
/// lookup target doesn't exist" — absence is never fatal here; schema
/// provisioning at startup is responsible for the lookup field existing.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Record id for an idempotency key, if one was ever written.
    async fn find_by_key(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Create a record, returning its new id.
    async fn create(&self, record: &OutcomeRecord) -> Result<String, StoreError>;

    /// Overwrite an existing record in place.
    async fn update(&self, id: &str, record: &OutcomeRecord) -> Result<(), StoreError>;
}
