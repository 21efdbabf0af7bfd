//! REST outcome store backend.
//!
//! Speaks the Airtable record API: bearer-token auth, key lookup via a
//! filter formula, JSON field payloads, and a metadata endpoint for
//! schema provisioning at startup.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{OutcomeRecord, OutcomeStore};

// Field names as they appear in the store table.
const F_COMPANY: &str = "Company";
const F_INTERVIEWER: &str = "Interviewer";
const F_INTERVIEWER_EMAIL: &str = "Interviewer Email";
const F_CANDIDATE: &str = "Candidate";
const F_CANDIDATE_EMAIL: &str = "Candidate Email";
const F_ROUND: &str = "Round";
const F_ROUND_LINK: &str = "Round Link";
const F_ADDED_ON: &str = "Added On";
const F_STATUS: &str = "Status";
const F_FAILURE_REASON: &str = "Failure Reason";
const F_SENT_AT: &str = "Sent At";
const F_TAT_SECONDS: &str = "TAT Seconds";
const F_PROCESSED: &str = "Processed";
const F_IDEMPOTENCY_KEY: &str = "Idempotency Key";

/// Cap error-body snippets kept in `StoreError::Api`.
const ERROR_BODY_LIMIT: usize = 300;

/// REST-backed outcome store.
pub struct RestStore {
    client: reqwest::Client,
    token: String,
    records_url: String,
    meta_url: String,
    table: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Self {
        let base = config.api_base.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
            records_url: format!("{base}/{}/{}", config.base_id, config.table),
            meta_url: format!("{base}/meta/bases/{}/tables", config.base_id),
            table: config.table.clone(),
        }
    }

    async fn request_json(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, StoreError> {
        let response = builder
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !status.is_success() {
            let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Ensure every field this system writes exists on the table.
    ///
    /// Per-field creation failures are logged and tolerated; failing to
    /// reach the metadata endpoint, or creating none of the missing
    /// fields, is fatal. Returns the number of fields created.
    pub async fn provision_schema(&self) -> Result<usize, StoreError> {
        let raw = self.request_json(self.client.get(&self.meta_url)).await?;
        let list: TableList =
            serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;

        let table = list
            .tables
            .into_iter()
            .find(|t| t.name == self.table)
            .ok_or_else(|| {
                StoreError::Provisioning(format!("table {:?} not found in base", self.table))
            })?;

        let existing: HashSet<String> = table.fields.into_iter().map(|f| f.name).collect();
        let fields_url = format!("{}/{}/fields", self.meta_url, table.id);

        let mut created = 0usize;
        let mut failed = 0usize;
        for spec in field_specs() {
            let name = spec["name"].as_str().unwrap_or_default().to_string();
            if existing.contains(&name) {
                continue;
            }
            match self
                .request_json(self.client.post(&fields_url).json(&spec))
                .await
            {
                Ok(_) => {
                    info!(field = %name, "Provisioned store field");
                    created += 1;
                }
                Err(e) => {
                    warn!(field = %name, error = %e, "Could not provision store field");
                    failed += 1;
                }
            }
        }

        if failed > 0 && created == 0 {
            return Err(StoreError::Provisioning(format!(
                "none of the {failed} missing fields could be created"
            )));
        }
        Ok(created)
    }
}

#[async_trait]
impl OutcomeStore for RestStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        let formula = format!("{{{F_IDEMPOTENCY_KEY}}} = '{key}'");
        let raw = self
            .request_json(
                self.client
                    .get(&self.records_url)
                    .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")]),
            )
            .await?;
        let list: RecordList =
            serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    async fn create(&self, record: &OutcomeRecord) -> Result<String, StoreError> {
        let body = json!({
            "records": [{ "fields": to_fields(record) }],
            "typecast": true,
        });
        let raw = self
            .request_json(self.client.post(&self.records_url).json(&body))
            .await?;
        let list: RecordList =
            serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;
        list.records
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Decode("create returned no record".into()))
    }

    async fn update(&self, id: &str, record: &OutcomeRecord) -> Result<(), StoreError> {
        let url = format!("{}/{id}", self.records_url);
        let body = json!({
            "fields": to_fields(record),
            "typecast": true,
        });
        self.request_json(self.client.patch(&url).json(&body))
            .await?;
        Ok(())
    }
}

// ── Wire shapes ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RecordList {
    records: Vec<RecordStub>,
}

#[derive(Deserialize)]
struct RecordStub {
    id: String,
}

#[derive(Deserialize)]
struct TableList {
    tables: Vec<TableMeta>,
}

#[derive(Deserialize)]
struct TableMeta {
    id: String,
    name: String,
    fields: Vec<FieldMeta>,
}

#[derive(Deserialize)]
struct FieldMeta {
    name: String,
}

/// Serialize a record to the store's field payload. `None`s serialize
/// as null so stale values clear on update.
fn to_fields(record: &OutcomeRecord) -> Value {
    json!({
        F_COMPANY: record.company,
        F_INTERVIEWER: record.interviewer,
        F_INTERVIEWER_EMAIL: record.interviewer_email,
        F_CANDIDATE: record.candidate,
        F_CANDIDATE_EMAIL: record.candidate_email,
        F_ROUND: record.round_name,
        F_ROUND_LINK: record.round_link,
        F_ADDED_ON: record.added_on.to_rfc3339(),
        F_STATUS: record.status.as_str(),
        F_FAILURE_REASON: record.failure_reason,
        F_SENT_AT: record.sent_at.map(|t| t.to_rfc3339()),
        F_TAT_SECONDS: record.tat_seconds,
        F_PROCESSED: record.processed,
        F_IDEMPOTENCY_KEY: record.idempotency_key,
    })
}

/// Creation specs for every field this system writes.
fn field_specs() -> Vec<Value> {
    let text = |name: &str| json!({ "name": name, "type": "singleLineText" });
    let email = |name: &str| json!({ "name": name, "type": "email" });
    let datetime = |name: &str| {
        json!({
            "name": name,
            "type": "dateTime",
            "options": {
                "timeZone": "utc",
                "dateFormat": { "name": "iso" },
                "timeFormat": { "name": "24hour" },
            },
        })
    };

    vec![
        text(F_COMPANY),
        text(F_INTERVIEWER),
        email(F_INTERVIEWER_EMAIL),
        text(F_CANDIDATE),
        email(F_CANDIDATE_EMAIL),
        text(F_ROUND),
        json!({ "name": F_ROUND_LINK, "type": "url" }),
        datetime(F_ADDED_ON),
        json!({
            "name": F_STATUS,
            "type": "singleSelect",
            "options": { "choices": [
                { "name": "sent" },
                { "name": "failed" },
                { "name": "queued" },
                { "name": "skipped" },
            ]},
        }),
        text(F_FAILURE_REASON),
        datetime(F_SENT_AT),
        json!({ "name": F_TAT_SECONDS, "type": "number", "options": { "precision": 0 } }),
        json!({
            "name": F_PROCESSED,
            "type": "checkbox",
            "options": { "icon": "check", "color": "greenBright" },
        }),
        text(F_IDEMPOTENCY_KEY),
    ]
}
