use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

pub const ARCHIVE_PREFIX: &str = "site_export_sse_";

/// UTC timestamp layout embedded in artifact names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static ARCHIVE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^site_export_sse_[a-f0-9]{7}_[A-Za-z0-9_-]+_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}\.zip$")
        .unwrap_or_else(|e| unreachable!("archive name pattern is valid: {e}"))
});

/// Characters stripped from file names before use.
const SPECIAL_CHARS: &[char] = &[
    '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*', '(',
    ')', '|', '~', '`', '!', '{', '}', '%', '+', '\u{2019}', '\u{ab}', '\u{bb}', '\u{201d}',
    '\u{201c}',
];

/// Whether `name` is a file name this system could have produced for an archive.
pub fn is_archive_file_name(name: &str) -> bool {
    ARCHIVE_NAME.is_match(name)
}

/// Strip characters that are unsafe in file names and turn whitespace runs
/// into single dashes. Leading and trailing `.`, `-` and `_` are removed.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if c.is_control() || SPECIAL_CHARS.contains(&c) {
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push(c);
    }

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
        .trim_matches(|c| c == '.' || c == '-' || c == '_')
        .to_string()
}

/// Reduce a display name to `[A-Za-z0-9_-]+` so it fits the archive grammar.
/// Falls back to `site` when nothing usable is left.
pub fn sanitize_site_name(name: &str) -> String {
    let cleaned: String = sanitize_file_name(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "site".to_string()
    } else {
        cleaned
    }
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Seven lowercase hex characters from the OS random source.
pub fn random_tag() -> Result<String> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes).map_err(|e| Error::Random(e.to_string()))?;
    let mut tag = hex::encode(bytes);
    tag.truncate(7);
    Ok(tag)
}

pub fn archive_file_name(tag: &str, site_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{ARCHIVE_PREFIX}{tag}_{}_{}.zip",
        sanitize_site_name(site_name),
        timestamp(now)
    )
}

pub fn new_archive_file_name(site_name: &str, now: DateTime<Utc>) -> Result<String> {
    Ok(archive_file_name(&random_tag()?, site_name, now))
}

pub fn dump_file_name(site_name: &str, now: DateTime<Utc>) -> String {
    format!("db_dump_{}_{}.sql", sanitize_site_name(site_name), timestamp(now))
}
