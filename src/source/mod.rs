//! Tabular input sources — pure I/O, no dispatch logic.
//!
//! A source yields rows in order; malformed rows surface as element-level
//! errors so one bad line never aborts the batch.

pub mod csv;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::identity;

pub use csv::CsvFileSource;

/// One source record, strongly typed. Field absence is a validation
/// error at dispatch time, not a silent empty.
#[derive(Debug, Clone)]
pub struct InputRow {
    /// Position of the row in the source, 0-based. Part of the row's
    /// identity so re-imports of the same file reproduce the same keys.
    pub ordinal: usize,
    pub company: String,
    pub interviewer: String,
    pub interviewer_email: String,
    pub candidate: String,
    pub candidate_email: String,
    /// Raw "Scheduling method" text; split into rounds downstream.
    pub scheduling_text: String,
    /// Raw "Added On" text; parsed downstream.
    pub added_on_raw: String,
}

impl InputRow {
    /// Names of required fields that are missing/blank, empty when valid.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.company.trim().is_empty() {
            missing.push("company");
        }
        if self.candidate.trim().is_empty() {
            missing.push("candidate");
        }
        if self.candidate_email.trim().is_empty() {
            missing.push("candidate email");
        }
        if self.added_on_raw.trim().is_empty() {
            missing.push("added on");
        }
        missing
    }

    /// Deterministic row identity used in idempotency keys.
    pub fn source_id(&self) -> String {
        identity::source_id(
            &self.company,
            &self.candidate,
            &self.candidate_email,
            &self.added_on_raw,
            self.ordinal,
        )
    }
}

/// A row, or the reason it couldn't be read.
pub type RowResult = Result<InputRow, SourceError>;

/// Ordered row provider.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<RowResult>, SourceError>;
}

/// In-memory source for tests and embedding.
pub struct MemorySource {
    rows: Vec<InputRow>,
}

impl MemorySource {
    pub fn new(rows: Vec<InputRow>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_rows(&self) -> Result<Vec<RowResult>, SourceError> {
        Ok(self.rows.iter().cloned().map(Ok).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> InputRow {
        InputRow {
            ordinal: 0,
            company: "Acme".into(),
            interviewer: "Sam".into(),
            interviewer_email: "sam@acme.com".into(),
            candidate: "Jo".into(),
            candidate_email: "jo@x.com".into(),
            scheduling_text: "Round 1: https://calendly.com/a".into(),
            added_on_raw: "03 Nov 6:15".into(),
        }
    }

    #[test]
    fn complete_row_has_no_missing_fields() {
        assert!(row().missing_fields().is_empty());
    }

    #[test]
    fn blank_required_fields_are_reported() {
        let mut r = row();
        r.candidate_email = "  ".into();
        r.added_on_raw = String::new();
        assert_eq!(r.missing_fields(), vec!["candidate email", "added on"]);
    }

    #[test]
    fn interviewer_fields_are_optional() {
        let mut r = row();
        r.interviewer = String::new();
        r.interviewer_email = String::new();
        assert!(r.missing_fields().is_empty());
    }

    #[test]
    fn source_id_depends_on_ordinal() {
        let a = row();
        let mut b = row();
        b.ordinal = 1;
        assert_ne!(a.source_id(), b.source_id());
    }
}
