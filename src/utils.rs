//! Text normalization, time formatting, and file system helpers.
//!
//! Everything here is a pure function except [`ensure_writable_dir`]:
//! - Markup stripping and summary capping for syndication entries
//! - Counter normalization for scraped badges (`"1,234"` -> `"1234"`)
//! - Timestamp rendering shared by every adapter
//! - Output directory validation for the snapshot writer

use chrono::{DateTime, Local, TimeZone, Utc};
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum length of a summary, in characters, before the marker is appended.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Appended to a summary that was cut at [`SUMMARY_MAX_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

/// Human-readable timestamp layout used for story and article times.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Strip markup from an HTML fragment and return its text content.
///
/// Character references are decoded and runs of whitespace are collapsed to
/// a single space.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_markup("<p>Hello <b>world</b> &amp; co</p>"), "Hello world & co");
/// ```
pub fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    let raw: String = fragment.root_element().text().collect();
    collapse_whitespace(&raw)
}

/// Decode HTML character references in plain text, leaving angle brackets
/// as literal text.
///
/// Feed titles often carry HTML-only entities such as `&nbsp;` or `&mdash;`
/// that an XML reader passes through undecoded.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return collapse_whitespace(text);
    }
    strip_markup(&text.replace('<', "&lt;").replace('>', "&gt;"))
}

/// Collapse every run of whitespace to one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap a summary at [`SUMMARY_MAX_CHARS`] characters.
///
/// Text at or under the limit is returned unchanged; longer text keeps its
/// first [`SUMMARY_MAX_CHARS`] characters followed by [`TRUNCATION_MARKER`].
pub fn truncate_summary(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
    capped.push_str(TRUNCATION_MARKER);
    capped
}

/// Normalize a scraped counter to a digit-only string.
///
/// Separators and surrounding words are dropped. Text without any digit
/// normalizes to `"0"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_count("1,234"), "1234");
/// assert_eq!(normalize_count(""), "0");
/// ```
pub fn normalize_count(text: &str) -> String {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}

/// Render epoch seconds as [`DISPLAY_TIME_FORMAT`] in UTC.
///
/// Out-of-range values render as the epoch itself.
pub fn format_epoch(secs: i64) -> String {
    let dt = DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
    dt.format(DISPLAY_TIME_FORMAT).to_string()
}

/// Parse a feed date (RFC 2822 or RFC 3339) and render it as
/// [`DISPLAY_TIME_FORMAT`] in UTC. Returns `None` when neither layout matches.
pub fn parse_feed_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format(DISPLAY_TIME_FORMAT).to_string())
}

/// Render a capture time as [`DISPLAY_TIME_FORMAT`].
pub fn format_display<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format(DISPLAY_TIME_FORMAT).to_string()
}

/// Render a capture time as an ISO-8601 local timestamp with microseconds.
pub fn format_iso(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then creates and immediately
/// deletes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
