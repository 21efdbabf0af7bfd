//! Round dispatch state machine.
//!
//! Each round unit runs through a fixed decision order — first matching
//! terminal wins:
//!
//! 1. already processed (store lookup by idempotency key, unless forced)
//! 2. invalid candidate email
//! 3. no scheduling link
//! 4. invalid scheduling link
//! 5. backpressure engaged → queued
//! 6. send attempt → sent / queued (quota) / failed
//!
//! Every terminal except (1) writes exactly one create-or-update to the
//! outcome store. Write failures are logged and swallowed; the unit will
//! simply be re-evaluated on the next run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::NotifyError;
use crate::identity::{self, LinkClass};
use crate::notify::{Invite, Notifier};
use crate::rounds::RoundUnit;
use crate::source::InputRow;
use crate::store::{OutcomeRecord, OutcomeStatus, OutcomeStore};

/// Machine-readable failure reasons persisted alongside outcomes.
/// Transport failures carry the transport's message verbatim instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    InvalidEmail,
    NoSchedulingLink,
    InvalidUrl,
    QuotaExhausted,
    AddedOnInFuture,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "invalid_email",
            Self::NoSchedulingLink => "no_scheduling_link",
            Self::InvalidUrl => "invalid_url",
            Self::QuotaExhausted => "quota_exhausted",
            Self::AddedOnInFuture => "added_on_in_future",
        }
    }
}

/// Decision for one round unit, carrying its payload so illegal
/// combinations (a sent timestamp on a skip, say) can't be represented.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// A record already exists for this key; nothing sent, nothing written.
    AlreadyProcessed,
    Sent {
        sent_at: DateTime<Utc>,
        tat_seconds: i64,
        /// Added-on was after the send instant; TAT was forced to zero
        /// and the record annotated. The send itself still counts.
        future_dated: bool,
    },
    /// Quota pushed back; left for a future run to re-attempt.
    Queued,
    Failed {
        message: String,
    },
    Skipped {
        reason: FailureReason,
    },
}

impl UnitOutcome {
    /// Short label for logging and progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyProcessed => "already_processed",
            Self::Sent { .. } => "sent",
            Self::Queued => "queued",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Mutable state shared by every unit of one batch run. Owned by the
/// orchestrator and passed down by mutable handle, so concurrent runs
/// (tests, embeddings) can't interfere with each other.
#[derive(Debug, Default)]
pub struct RunState {
    /// Set permanently once any quota signal is observed this run.
    pub quota_exhausted: bool,
}

/// Per-unit dispatcher over the store and notifier seams.
pub struct RoundDispatcher {
    store: Arc<dyn OutcomeStore>,
    notifier: Arc<dyn Notifier>,
    force_resend: bool,
}

impl RoundDispatcher {
    pub fn new(
        store: Arc<dyn OutcomeStore>,
        notifier: Arc<dyn Notifier>,
        force_resend: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            force_resend,
        }
    }

    /// Run one round unit through the state machine:
    /// lookup → validate → send → persist.
    pub async fn dispatch_round(
        &self,
        row: &InputRow,
        added_on: DateTime<Utc>,
        unit: &RoundUnit,
        run: &mut RunState,
    ) -> UnitOutcome {
        let key = identity::idempotency_key(&row.source_id(), &unit.name, &row.candidate_email);

        // A lookup that errors is treated as "not found" — provisioning
        // at startup is responsible for the lookup field existing.
        let existing = match self.store.find_by_key(&key).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, key = %key, "Key lookup failed; treating as not found");
                None
            }
        };

        if existing.is_some() && !self.force_resend {
            debug!(
                candidate = %row.candidate_email,
                round = %unit.name,
                "Round already processed; skipping"
            );
            return UnitOutcome::AlreadyProcessed;
        }

        let outcome = self.decide(row, added_on, unit, run).await;

        if let Some(record) = build_record(row, added_on, unit, &outcome, key) {
            self.persist(existing.as_deref(), &record).await;
        }

        info!(
            candidate = %row.candidate_email,
            round = %unit.name,
            outcome = outcome.label(),
            "Round processed"
        );
        outcome
    }

    /// Decision steps 2–6. Pure apart from the send attempt.
    async fn decide(
        &self,
        row: &InputRow,
        added_on: DateTime<Utc>,
        unit: &RoundUnit,
        run: &mut RunState,
    ) -> UnitOutcome {
        if !identity::is_valid_email(&row.candidate_email) {
            return UnitOutcome::Skipped {
                reason: FailureReason::InvalidEmail,
            };
        }

        let Some(link) = unit.link.as_deref() else {
            return UnitOutcome::Skipped {
                reason: FailureReason::NoSchedulingLink,
            };
        };

        match identity::classify_link(link) {
            None => {
                return UnitOutcome::Skipped {
                    reason: FailureReason::InvalidUrl,
                };
            }
            Some(LinkClass::Unverified) => {
                warn!(link = %link, round = %unit.name, "Scheduling link is not a recognized provider");
            }
            Some(LinkClass::Allowed) => {}
        }

        if run.quota_exhausted {
            return UnitOutcome::Queued;
        }

        let invite = Invite {
            candidate: row.candidate.clone(),
            candidate_email: row.candidate_email.clone(),
            company: row.company.clone(),
            interviewer: row.interviewer.clone(),
            round_name: unit.name.clone(),
            round_link: link.to_string(),
        };

        match self.notifier.send(&invite).await {
            Ok(()) => {
                let sent_at = Utc::now();
                let future_dated = added_on > sent_at;
                let tat_seconds = if future_dated {
                    0
                } else {
                    identity::turnaround_seconds(sent_at, added_on)
                };
                UnitOutcome::Sent {
                    sent_at,
                    tat_seconds,
                    future_dated,
                }
            }
            Err(NotifyError::QuotaExceeded) => {
                warn!(
                    candidate = %row.candidate_email,
                    "Send quota exhausted; queueing the remainder of the run"
                );
                run.quota_exhausted = true;
                UnitOutcome::Queued
            }
            Err(NotifyError::Send(message)) => {
                error!(candidate = %row.candidate_email, error = %message, "Send failed");
                UnitOutcome::Failed { message }
            }
        }
    }

    /// One create-or-update, keyed by the id the lookup found. Failures
    /// must not abort the batch.
    async fn persist(&self, existing_id: Option<&str>, record: &OutcomeRecord) {
        let result = match existing_id {
            Some(id) => self.store.update(id, record).await,
            None => self.store.create(record).await.map(|_| ()),
        };
        if let Err(e) = result {
            error!(
                error = %e,
                key = %record.idempotency_key,
                "Failed to persist outcome; batch continues"
            );
        }
    }
}

/// Materialize the store record for a decided outcome. Already-processed
/// units write nothing.
fn build_record(
    row: &InputRow,
    added_on: DateTime<Utc>,
    unit: &RoundUnit,
    outcome: &UnitOutcome,
    key: String,
) -> Option<OutcomeRecord> {
    let (status, failure_reason, sent_at, tat_seconds, processed) = match outcome {
        UnitOutcome::AlreadyProcessed => return None,
        UnitOutcome::Sent {
            sent_at,
            tat_seconds,
            future_dated,
        } => (
            OutcomeStatus::Sent,
            future_dated.then(|| FailureReason::AddedOnInFuture.as_str().to_string()),
            Some(*sent_at),
            Some(*tat_seconds),
            true,
        ),
        UnitOutcome::Queued => (
            OutcomeStatus::Queued,
            Some(FailureReason::QuotaExhausted.as_str().to_string()),
            None,
            None,
            false,
        ),
        UnitOutcome::Failed { message } => {
            (OutcomeStatus::Failed, Some(message.clone()), None, None, false)
        }
        UnitOutcome::Skipped { reason } => (
            OutcomeStatus::Skipped,
            Some(reason.as_str().to_string()),
            None,
            None,
            false,
        ),
    };

    Some(OutcomeRecord {
        company: row.company.clone(),
        interviewer: row.interviewer.clone(),
        interviewer_email: row.interviewer_email.clone(),
        candidate: row.candidate.clone(),
        candidate_email: row.candidate_email.clone(),
        round_name: unit.name.clone(),
        round_link: unit.link.clone(),
        added_on,
        status,
        failure_reason,
        sent_at,
        tat_seconds,
        processed,
        idempotency_key: key,
    })
}
