//! Round splitter — free-text scheduling method → ordered round units.
//!
//! The "Scheduling method" column is human-entered. Common shapes:
//! labeled lines (`Round 1: https://...`, `R2: see link`), labels with no
//! link, bare links with no label, or unstructured prose. Splitting is
//! total: structure that can't be recognized degrades to a single round.

use std::sync::OnceLock;

use regex::Regex;

/// One normalized interview round derived from a row's scheduling text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundUnit {
    /// Canonical name, always `"Round <n>"`.
    pub name: String,
    /// Scheduling link for the round, if one was given.
    pub link: Option<String>,
}

/// `Round 1: <rest>` / `R2 : <rest>`, case-insensitive, optional spaces.
fn labeled_with_rest_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:round|r)\s*(\d+)\s*:\s*(.+)$").unwrap())
}

/// Leading round label with a number but no colon remainder.
fn label_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^r(?:ound)?\s*(\d+)").unwrap())
}

/// Split scheduling text into ordered, name-deduplicated round units.
///
/// Lines are tried in order against: labeled-with-link, labeled-without-
/// link, bare URL. A non-blank text that matches nothing still yields a
/// single `"Round 1"` unit so the row is never silently dropped.
pub fn split(text: &str) -> Vec<RoundUnit> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut units: Vec<RoundUnit> = Vec::new();

    for raw_line in normalized.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        // 1. Labeled round with a remainder that may hold a link.
        if let Some(caps) = labeled_with_rest_re().captures(line) {
            let name = normalize_round_name(&caps[1]);
            if has_round(&units, &name) {
                continue;
            }
            let link = extract_url(&caps[2]);
            units.push(RoundUnit { name, link });
            continue;
        }

        // 2. Round label without a link. Dedup is by normalized name, so
        //    `round 2` and `R02` collapse onto one unit.
        if line.to_ascii_lowercase().starts_with('r') {
            let name = match label_number_re().captures(line) {
                Some(caps) => normalize_round_name(&caps[1]),
                None => format!("Round {}", units.len() + 1),
            };
            if has_round(&units, &name) {
                continue;
            }
            units.push(RoundUnit { name, link: None });
            continue;
        }

        // 3. A line that is itself a URL gets an inferred round number.
        if is_bare_url(line) {
            let name = format!("Round {}", units.len() + 1);
            if has_round(&units, &name) {
                continue;
            }
            units.push(RoundUnit {
                name,
                link: Some(line.to_string()),
            });
            continue;
        }

        // 4. Line contributes nothing.
    }

    if units.is_empty() {
        units.push(RoundUnit {
            name: "Round 1".to_string(),
            link: extract_url(trimmed),
        });
    }

    units
}

/// Extract a URL from a text fragment.
///
/// A fragment that is itself an http(s) URL is used verbatim; otherwise
/// the first `http(s)://` substring up to the next whitespace wins.
pub fn extract_url(fragment: &str) -> Option<String> {
    let trimmed = fragment.trim();
    if is_bare_url(trimmed) {
        return Some(trimmed.to_string());
    }

    let start = match (trimmed.find("http://"), trimmed.find("https://")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let rest = &trimmed[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Canonicalize captured digits into `"Round <n>"` (strips leading zeros).
fn normalize_round_name(digits: &str) -> String {
    match digits.parse::<u64>() {
        Ok(n) => format!("Round {n}"),
        Err(_) => format!("Round {digits}"),
    }
}

fn has_round(units: &[RoundUnit], name: &str) -> bool {
    units.iter().any(|u| u.name == name)
}

/// Whole-string check: an http(s) URL with a host part and no whitespace.
fn is_bare_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match rest {
        Some(r) => !r.is_empty() && !s.contains(char::is_whitespace),
        None => false,
    }
}
