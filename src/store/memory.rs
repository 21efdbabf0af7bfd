//! In-memory outcome store for tests and dry runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{OutcomeRecord, OutcomeStore};

#[derive(Default)]
struct Inner {
    next_id: usize,
    records: Vec<(String, OutcomeRecord)>,
    fail_writes: bool,
}

/// HashMap-free ordered store; scans are fine at test scale.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent create/update calls fail, to exercise the
    /// swallow-persistence-errors path.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().await.fail_writes = fail;
    }

    /// Snapshot of all records in insertion order.
    pub async fn records(&self) -> Vec<(String, OutcomeRecord)> {
        self.inner.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .find(|(_, r)| r.idempotency_key == key)
            .map(|(id, _)| id.clone()))
    }

    async fn create(&self, record: &OutcomeRecord) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_writes {
            return Err(StoreError::Http("simulated write failure".into()));
        }
        inner.next_id += 1;
        let id = format!("rec{}", inner.next_id);
        inner.records.push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn update(&self, id: &str, record: &OutcomeRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_writes {
            return Err(StoreError::Http("simulated write failure".into()));
        }
        match inner.records.iter_mut().find(|(rid, _)| rid == id) {
            Some((_, existing)) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::Api {
                status: 404,
                message: format!("no record {id}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OutcomeStatus;
    use chrono::Utc;

    fn record(key: &str) -> OutcomeRecord {
        OutcomeRecord {
            company: "Acme".into(),
            interviewer: String::new(),
            interviewer_email: String::new(),
            candidate: "Jo".into(),
            candidate_email: "jo@x.com".into(),
            round_name: "Round 1".into(),
            round_link: Some("https://calendly.com/a".into()),
            added_on: Utc::now(),
            status: OutcomeStatus::Skipped,
            failure_reason: Some("invalid_email".into()),
            sent_at: None,
            tat_seconds: None,
            processed: false,
            idempotency_key: key.into(),
        }
    }

    #[tokio::test]
    async fn create_then_find_then_update() {
        let store = MemoryStore::new();
        assert_eq!(store.find_by_key("k1").await.unwrap(), None);

        let id = store.create(&record("k1")).await.unwrap();
        assert_eq!(store.find_by_key("k1").await.unwrap(), Some(id.clone()));

        let mut updated = record("k1");
        updated.status = OutcomeStatus::Sent;
        updated.processed = true;
        store.update(&id, &updated).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.status, OutcomeStatus::Sent);
    }

    #[tokio::test]
    async fn failed_writes_surface_as_errors() {
        let store = MemoryStore::new();
        store.set_fail_writes(true).await;
        assert!(store.create(&record("k1")).await.is_err());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.update("rec99", &record("k1")).await.is_err());
    }
}
