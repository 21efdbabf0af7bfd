//! CSV file source — header-mapped, quote-aware.
//!
//! The scheduling-method column routinely holds embedded newlines, so
//! records are parsed from the raw character stream rather than per line.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::source::{InputRow, RecordSource, RowResult};

/// CSV export reader.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for CsvFileSource {
    async fn fetch_rows(&self) -> Result<Vec<RowResult>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut records = parse_records(text).into_iter();
        let (_, header) = records.next().ok_or(SourceError::NoHeader)?;
        let columns = resolve_columns(&header)?;
        debug!(path = %self.path.display(), "CSV header resolved");

        let mut rows = Vec::new();
        for (ordinal, (line, record)) in records.enumerate() {
            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }
            if record.len() != header.len() {
                rows.push(Err(SourceError::MalformedRow {
                    line,
                    message: format!(
                        "expected {} fields, got {}",
                        header.len(),
                        record.len()
                    ),
                }));
                continue;
            }
            rows.push(Ok(columns.to_row(ordinal, &record)));
        }
        Ok(rows)
    }
}

// ── Header resolution ───────────────────────────────────────────────

struct Columns {
    company: usize,
    interviewer: Option<usize>,
    interviewer_email: Option<usize>,
    candidate: usize,
    candidate_email: usize,
    scheduling: usize,
    added_on: usize,
}

impl Columns {
    fn to_row(&self, ordinal: usize, record: &[String]) -> InputRow {
        let field = |idx: usize| record[idx].trim().to_string();
        InputRow {
            ordinal,
            company: field(self.company),
            interviewer: self.interviewer.map(field).unwrap_or_default(),
            interviewer_email: self.interviewer_email.map(field).unwrap_or_default(),
            candidate: field(self.candidate),
            candidate_email: field(self.candidate_email),
            // keep internal structure: the splitter needs the raw lines
            scheduling_text: record[self.scheduling].trim().to_string(),
            added_on_raw: field(self.added_on),
        }
    }
}

fn resolve_columns(header: &[String]) -> Result<Columns, SourceError> {
    let find = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let require = |name: &'static str| {
        find(name).ok_or_else(|| SourceError::MissingColumn(name.to_string()))
    };

    Ok(Columns {
        company: require("company")?,
        interviewer: find("interviewer"),
        interviewer_email: find("interviewer email"),
        candidate: require("candidate")?,
        candidate_email: require("candidate email")?,
        scheduling: require("scheduling method")?,
        added_on: require("added on")?,
    })
}

// ── Record parsing ──────────────────────────────────────────────────

/// Parse CSV text into records with their 1-based starting line numbers.
/// Handles quoted fields, doubled-quote escapes, and newlines inside
/// quotes.
fn parse_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut field));
            }
            '\r' if !in_quotes => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                line += 1;
                record.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut record)));
                record_line = line;
            }
            '\n' if !in_quotes => {
                line += 1;
                record.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut record)));
                record_line = line;
            }
            '\n' => {
                line += 1;
                field.push('\n');
            }
            other => field.push(other),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }

    // A trailing newline leaves a phantom empty record; drop it.
    if let Some((_, last)) = records.last()
        && last.len() == 1
        && last[0].is_empty()
    {
        records.pop();
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_for(content: &str) -> (tempfile::NamedTempFile, CsvFileSource) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let source = CsvFileSource::new(file.path());
        (file, source)
    }

    const HEADER: &str =
        "Company,Interviewer,Interviewer Email,Candidate,Candidate Email,Scheduling method,Added On";

    #[tokio::test]
    async fn reads_simple_rows_in_order() {
        let content = format!(
            "{HEADER}\nAcme,Sam,sam@acme.com,Jo,jo@x.com,Round 1: https://calendly.com/a,03 Nov 6:15\nGlobex,Ann,ann@globex.com,Ben,ben@y.com,https://cal.com/b,04 Nov 9:00\n"
        );
        let (_guard, source) = source_for(&content);
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 2);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.ordinal, 0);
        assert_eq!(first.company, "Acme");
        assert_eq!(first.candidate_email, "jo@x.com");

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.ordinal, 1);
        assert_eq!(second.company, "Globex");
    }

    #[tokio::test]
    async fn quoted_multiline_scheduling_text_survives() {
        let content = format!(
            "{HEADER}\nAcme,Sam,sam@acme.com,Jo,jo@x.com,\"Round1: https://calendly.com/a\nRound2: https://calendly.com/b\",03 Nov 6:15\n"
        );
        let (_guard, source) = source_for(&content);
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert!(row.scheduling_text.contains('\n'));
        assert!(row.scheduling_text.contains("Round2"));
    }

    #[tokio::test]
    async fn doubled_quotes_unescape() {
        let content = format!(
            "{HEADER}\n\"Acme \"\"Labs\"\"\",Sam,sam@acme.com,Jo,jo@x.com,Round 1,03 Nov 6:15\n"
        );
        let (_guard, source) = source_for(&content);
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows[0].as_ref().unwrap().company, "Acme \"Labs\"");
    }

    #[tokio::test]
    async fn header_match_is_case_insensitive() {
        let content = "COMPANY,CANDIDATE,candidate EMAIL,Scheduling Method,ADDED ON\nAcme,Jo,jo@x.com,Round 1,03 Nov 6:15\n";
        let (_guard, source) = source_for(content);
        let rows = source.fetch_rows().await.unwrap();
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.company, "Acme");
        // interviewer columns absent from this export
        assert!(row.interviewer.is_empty());
    }

    #[tokio::test]
    async fn missing_required_column_is_fatal() {
        let content = "Company,Candidate,Candidate Email,Added On\nAcme,Jo,jo@x.com,03 Nov 6:15\n";
        let (_guard, source) = source_for(content);
        let err = source.fetch_rows().await.unwrap_err();
        assert!(matches!(err, SourceError::MissingColumn(c) if c == "scheduling method"));
    }

    #[tokio::test]
    async fn short_row_is_an_element_error_not_fatal() {
        let content = format!(
            "{HEADER}\nAcme,Sam\nGlobex,Ann,ann@globex.com,Ben,ben@y.com,Round 1,04 Nov 9:00\n"
        );
        let (_guard, source) = source_for(&content);
        let rows = source.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_err());
        assert_eq!(rows[1].as_ref().unwrap().company, "Globex");
    }

    #[tokio::test]
    async fn empty_file_has_no_header() {
        let (_guard, source) = source_for("");
        assert!(matches!(
            source.fetch_rows().await.unwrap_err(),
            SourceError::NoHeader
        ));
    }

    #[test]
    fn parse_records_tracks_starting_lines() {
        let records = parse_records("a,b\n\"multi\nline\",c\nx,y\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].0, 1);
        assert_eq!(records[1].0, 2);
        assert_eq!(records[1].1[0], "multi\nline");
        assert_eq!(records[2].0, 4);
    }
}
