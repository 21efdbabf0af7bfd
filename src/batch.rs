//! Batch orchestrator — drives the state machine over an ordered batch.
//!
//! Rows are processed strictly in input order, rounds in splitter order,
//! because the backpressure flag and the counters are shared mutable
//! state for the run. Individual row failures never abort the batch.

use chrono::{FixedOffset, Utc};
use tracing::{info, warn};

use crate::dispatch::{RoundDispatcher, RunState, UnitOutcome};
use crate::identity;
use crate::rounds;
use crate::source::RowResult;

/// Aggregate counters for one run. Recomputed fresh each run; never
/// persisted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub rounds_seen: usize,
    pub sent: usize,
    pub failed: usize,
    pub queued: usize,
    pub skipped: usize,
    pub already_processed: usize,
    /// Mean turnaround over this run's sent units with a non-future
    /// added-on. `None` when nothing qualifies.
    pub avg_tat_seconds: Option<f64>,
}

/// Owns the per-run state (backpressure flag, counters) for the
/// duration of one batch.
pub struct BatchRunner {
    dispatcher: RoundDispatcher,
    default_offset: FixedOffset,
}

impl BatchRunner {
    pub fn new(dispatcher: RoundDispatcher, default_offset: FixedOffset) -> Self {
        Self {
            dispatcher,
            default_offset,
        }
    }

    /// Process every row: validate → parse date → split rounds → run the
    /// state machine per round → accumulate counts.
    pub async fn run(&self, rows: Vec<RowResult>) -> BatchSummary {
        let mut run = RunState::default();
        let mut summary = BatchSummary::default();
        let mut sent_tats: Vec<i64> = Vec::new();

        info!(rows = rows.len(), "Starting batch");

        for row_result in rows {
            summary.rows_total += 1;

            let row = match row_result {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable row");
                    summary.rows_skipped += 1;
                    continue;
                }
            };

            let missing = row.missing_fields();
            if !missing.is_empty() {
                warn!(
                    row = row.ordinal,
                    missing = %missing.join(", "),
                    "Skipping row with missing required fields"
                );
                summary.rows_skipped += 1;
                continue;
            }

            let added_on = match identity::parse_added_on(
                &row.added_on_raw,
                self.default_offset,
                Utc::now(),
            ) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(row = row.ordinal, error = %e, "Skipping row with unparseable added-on");
                    summary.rows_skipped += 1;
                    continue;
                }
            };

            let units = rounds::split(&row.scheduling_text);
            if units.is_empty() {
                warn!(
                    row = row.ordinal,
                    candidate = %row.candidate,
                    "No rounds detected; skipping row"
                );
                summary.rows_skipped += 1;
                continue;
            }

            for unit in &units {
                summary.rounds_seen += 1;
                let outcome = self
                    .dispatcher
                    .dispatch_round(&row, added_on, unit, &mut run)
                    .await;
                match outcome {
                    UnitOutcome::Sent {
                        tat_seconds,
                        future_dated,
                        ..
                    } => {
                        summary.sent += 1;
                        if !future_dated {
                            sent_tats.push(tat_seconds);
                        }
                    }
                    UnitOutcome::Failed { .. } => summary.failed += 1,
                    UnitOutcome::Queued => summary.queued += 1,
                    UnitOutcome::Skipped { .. } => summary.skipped += 1,
                    UnitOutcome::AlreadyProcessed => summary.already_processed += 1,
                }
            }
        }

        if !sent_tats.is_empty() {
            let total: i64 = sent_tats.iter().sum();
            summary.avg_tat_seconds = Some(total as f64 / sent_tats.len() as f64);
        }

        info!(
            rounds = summary.rounds_seen,
            sent = summary.sent,
            failed = summary.failed,
            queued = summary.queued,
            skipped = summary.skipped,
            already_processed = summary.already_processed,
            rows_skipped = summary.rows_skipped,
            "Batch complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use crate::error::{NotifyError, SourceError};
    use crate::notify::{Invite, Notifier};
    use crate::source::InputRow;
    use crate::store::{MemoryStore, OutcomeStatus};

    struct MockNotifier {
        script: Mutex<VecDeque<Result<(), NotifyError>>>,
        sent_to: Mutex<Vec<String>>,
    }

    impl MockNotifier {
        fn always_ok() -> Self {
            Self::scripted(vec![])
        }

        fn scripted(responses: Vec<Result<(), NotifyError>>) -> Self {
            Self {
                script: Mutex::new(responses.into()),
                sent_to: Mutex::new(Vec::new()),
            }
        }

        async fn sent_count(&self) -> usize {
            self.sent_to.lock().await.len()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, invite: &Invite) -> Result<(), NotifyError> {
            self.sent_to.lock().await.push(invite.candidate_email.clone());
            self.script.lock().await.pop_front().unwrap_or(Ok(()))
        }
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn row(ordinal: usize, candidate_email: &str, scheduling: &str) -> InputRow {
        // two hours in the past, regardless of when the test runs
        let added_on_raw = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        InputRow {
            ordinal,
            company: "Acme".into(),
            interviewer: "Sam".into(),
            interviewer_email: "sam@acme.com".into(),
            candidate: "Jo".into(),
            candidate_email: candidate_email.into(),
            scheduling_text: scheduling.into(),
            added_on_raw,
        }
    }

    fn runner(store: Arc<MemoryStore>, notifier: Arc<MockNotifier>) -> BatchRunner {
        BatchRunner::new(
            RoundDispatcher::new(store, notifier, false),
            ist(),
        )
    }

    #[tokio::test]
    async fn two_round_row_sends_both_with_distinct_keys() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::always_ok());
        let r = runner(store.clone(), notifier.clone());

        let rows = vec![Ok(row(
            0,
            "jo@x.com",
            "Round1: https://calendly.com/a\nRound2: https://calendly.com/b",
        ))];
        let summary = r.run(rows).await;

        assert_eq!(summary.rounds_seen, 2);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.rows_skipped, 0);
        assert_eq!(notifier.sent_count().await, 2);

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].1.idempotency_key, records[1].1.idempotency_key);
        for (_, rec) in &records {
            assert_eq!(rec.status, OutcomeStatus::Sent);
            assert!(rec.tat_seconds.unwrap() >= 0);
        }
    }

    #[tokio::test]
    async fn invalid_candidate_email_skips_every_round_without_sending() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::always_ok());
        let r = runner(store.clone(), notifier.clone());

        let rows = vec![Ok(row(
            0,
            "not-an-email",
            "Round1: https://calendly.com/a\nRound2: https://calendly.com/b",
        ))];
        let summary = r.run(rows).await;

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.sent, 0);
        assert_eq!(notifier.sent_count().await, 0);

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        for (_, rec) in &records {
            assert_eq!(rec.status, OutcomeStatus::Skipped);
            assert_eq!(rec.failure_reason.as_deref(), Some("invalid_email"));
        }
    }

    #[tokio::test]
    async fn quota_signal_queues_every_later_unit_across_rows() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::scripted(vec![
            Ok(()),
            Err(NotifyError::QuotaExceeded),
        ]));
        let r = runner(store.clone(), notifier.clone());

        let rows = vec![
            Ok(row(0, "a@x.com", "Round 1: https://calendly.com/a")),
            Ok(row(1, "b@x.com", "Round 1: https://calendly.com/b")),
            Ok(row(2, "c@x.com", "Round 1: https://calendly.com/c")),
            Ok(row(3, "d@x.com", "Round 1: https://calendly.com/d")),
        ];
        let summary = r.run(rows).await;

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.queued, 3);
        // only the first two units ever reached the notifier
        assert_eq!(notifier.sent_count().await, 2);

        let records = store.records().await;
        let queued: Vec<_> = records
            .iter()
            .filter(|(_, rec)| rec.status == OutcomeStatus::Queued)
            .collect();
        assert_eq!(queued.len(), 3);
        for (_, rec) in queued {
            assert_eq!(rec.failure_reason.as_deref(), Some("quota_exhausted"));
        }
    }

    #[tokio::test]
    async fn rerun_over_identical_input_sends_nothing_new() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::always_ok());

        // byte-identical input for both passes
        let input = vec![
            row(0, "a@x.com", "Round 1: https://calendly.com/a"),
            row(
                1,
                "b@x.com",
                "Round 1: https://calendly.com/b\nRound 2: https://calendly.com/c",
            ),
        ];
        let rows = |input: &[InputRow]| input.iter().cloned().map(Ok).collect();

        let first = runner(store.clone(), notifier.clone())
            .run(rows(&input))
            .await;
        assert_eq!(first.sent, 3);

        let second = runner(store.clone(), notifier.clone())
            .run(rows(&input))
            .await;
        assert_eq!(second.sent, 0);
        assert_eq!(second.already_processed, 3);
        assert_eq!(notifier.sent_count().await, 3);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn row_level_problems_skip_the_row_and_continue() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::always_ok());
        let r = runner(store.clone(), notifier.clone());

        let mut no_email = row(1, "", "Round 1: https://calendly.com/a");
        no_email.candidate_email = String::new();
        let mut bad_date = row(2, "c@x.com", "Round 1: https://calendly.com/c");
        bad_date.added_on_raw = "whenever".into();
        let blank_rounds = row(3, "d@x.com", "   ");

        let rows = vec![
            Err(SourceError::MalformedRow {
                line: 2,
                message: "expected 7 fields, got 2".into(),
            }),
            Ok(no_email),
            Ok(bad_date),
            Ok(blank_rounds),
            Ok(row(4, "e@x.com", "Round 1: https://calendly.com/e")),
        ];
        let summary = r.run(rows).await;

        assert_eq!(summary.rows_total, 5);
        assert_eq!(summary.rows_skipped, 4);
        assert_eq!(summary.sent, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn mean_tat_excludes_future_dated_sends() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::always_ok());
        let r = runner(store.clone(), notifier.clone());

        let future_raw = (Utc::now() + chrono::Duration::days(2))
            .to_rfc3339();
        let mut future_row = row(1, "b@x.com", "Round 1: https://calendly.com/b");
        future_row.added_on_raw = future_raw;

        let rows = vec![
            Ok(row(0, "a@x.com", "Round 1: https://calendly.com/a")),
            Ok(future_row),
        ];
        let summary = r.run(rows).await;

        assert_eq!(summary.sent, 2);
        // the future-dated unit's forced zero is excluded from the mean
        let avg = summary.avg_tat_seconds.unwrap();
        assert!(avg > 0.0);
    }
}
