//! Document names: `{name}-{timestamp}`.
//!
//! The timestamp is ISO-8601 with millisecond precision, with every `:` and
//! `.` replaced by `-` so the result is safe as a file name on every platform
//! and on the device:
//!
//! ```text
//! "Meeting notes"  +  2026-10-18T09:41:07.125Z  →  "Meeting-notes-2026-10-18T09-41-07-125"
//! ```
//!
//! The caller-supplied part is reduced to `[A-Za-z0-9._-]` so it cannot
//! escape the temp directory or smuggle quotes into a command line.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest caller-supplied name kept before the timestamp is appended.
const MAX_NAME_LEN: usize = 80;

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());
static RE_DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Reduce a user-supplied name to a safe file-name stem.
///
/// Returns `None` when nothing usable is left, so the caller can fall back
/// to its default.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".pdf").unwrap_or(raw);
    let replaced = RE_UNSAFE.replace_all(raw, "-");
    let collapsed = RE_DASH_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        return None;
    }
    let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    while name.ends_with('.') || name.ends_with('-') {
        name.pop();
    }
    Some(name)
}

/// Format `now` the way document names embed it.
pub fn timestamp_component(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .trim_end_matches('Z')
        .replace([':', '.'], "-")
}

/// Build `{sanitised name or default}-{timestamp}` (no extension).
pub fn document_name(requested: Option<&str>, default_name: &str, now: DateTime<Utc>) -> String {
    let stem = requested
        .and_then(sanitize_name)
        .or_else(|| sanitize_name(default_name))
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}-{}", timestamp_component(now))
}
