//! Row identity and validation — date parsing, email/URL checks,
//! idempotency-key derivation, turnaround arithmetic.
//!
//! Everything here is a pure function of its arguments; the dispatch
//! state machine decides what the results mean.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, FixedOffset, LocalResult, NaiveDateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Separator for key material; never expected inside a field value.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Scheduling providers treated as verified destinations. Subdomains
/// included.
const ALLOWED_LINK_DOMAINS: &[&str] = &["calendly.com", "cal.com", "forms.gle"];

/// The added-on column couldn't be read as a timestamp. The row is
/// unusable without it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unparseable added-on timestamp: {raw:?}")]
pub struct DateParseError {
    pub raw: String,
}

// ── Timestamp parsing ───────────────────────────────────────────────

/// Naive formats that carry an explicit year, tried in order.
const YEARED_FORMATS: &[&str] = &[
    "%d/%m/%Y %I:%M %p",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %I:%M %p",
    "%d %b %Y %H:%M",
    "%d %B %Y %H:%M",
];

/// Formats with no year; the current year is substituted before parsing.
/// The last entry is the strict `DD MON HH:MM` fallback.
const YEARLESS_FORMATS: &[&str] = &["%Y %d %b %I:%M %p", "%Y %d/%m %H:%M", "%Y %d %b %H:%M"];

/// Parse a human-entered added-on string into UTC.
///
/// Layered best-effort: RFC 3339 (zone-carrying) first, then naive
/// formats read in `default_offset`, then yearless formats with the
/// current year substituted. All layers failing is a row-level error —
/// the caller skips the row.
pub fn parse_added_on(
    raw: &str,
    default_offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError { raw: raw.into() });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in YEARED_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return resolve_local(naive, default_offset, raw);
        }
    }

    let year = now.with_timezone(&default_offset).year();
    let with_year = format!("{year} {trimmed}");
    for fmt in YEARLESS_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, fmt) {
            return resolve_local(naive, default_offset, raw);
        }
    }

    Err(DateParseError { raw: raw.into() })
}

fn resolve_local(
    naive: NaiveDateTime,
    offset: FixedOffset,
    raw: &str,
) -> Result<DateTime<Utc>, DateParseError> {
    match naive.and_local_timezone(offset) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => Err(DateParseError { raw: raw.into() }),
    }
}

// ── Field validation ────────────────────────────────────────────────

/// Syntactic email check: `local@domain` with a dotted domain. No
/// deliverability probing.
pub fn is_valid_email(email: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
    re.is_match(email.trim())
}

/// How a syntactically valid scheduling link relates to the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    /// Host is a recognized scheduling provider (or a subdomain of one).
    Allowed,
    /// Valid http(s) URL on an unrecognized host. Warning-level only.
    Unverified,
}

/// Classify a scheduling link. `None` means hard-invalid: not an
/// absolute http(s) URL. Unverified hosts keep the link.
pub fn classify_link(link: &str) -> Option<LinkClass> {
    let url = reqwest::Url::parse(link.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let allowed = ALLOWED_LINK_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")));
    Some(if allowed {
        LinkClass::Allowed
    } else {
        LinkClass::Unverified
    })
}

// ── Identity ────────────────────────────────────────────────────────

/// Deterministic row identifier. Depends only on row content and its
/// ordinal position in the source — never on wall clock or run.
pub fn source_id(
    company: &str,
    candidate: &str,
    candidate_email: &str,
    added_on_raw: &str,
    ordinal: usize,
) -> String {
    format!(
        "{company}{sep}{candidate}{sep}{candidate_email}{sep}{added_on_raw}{sep}{ordinal}",
        sep = KEY_SEPARATOR
    )
}

/// Idempotency key for one round unit: fixed-length hex digest over
/// (source id, round name, candidate email).
pub fn idempotency_key(source_id: &str, round_name: &str, candidate_email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([KEY_SEPARATOR as u8]);
    hasher.update(round_name.as_bytes());
    hasher.update([KEY_SEPARATOR as u8]);
    hasher.update(candidate_email.as_bytes());
    hex::encode(hasher.finalize())
}

// ── Turnaround ──────────────────────────────────────────────────────

/// Whole seconds between added-on and send, rounded. Negative when the
/// clocks disagree; not clamped here.
pub fn turnaround_seconds(sent_at: DateTime<Utc>, added_on: DateTime<Utc>) -> i64 {
    let millis = (sent_at - added_on).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}
