//! Utility functions for text cleanup, truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Markup stripping and whitespace collapsing for previews
//! - Character-safe truncation for previews and log lines
//! - Title keys for near-duplicate detection
//! - File system validation for the cache and output directories

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Truncate to `max` characters, appending `...` when anything was cut.
pub fn truncate_preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...", &s[..cut]),
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Reduce an HTML snippet to its visible text.
///
/// Entities are decoded by the HTML parser, tags are dropped and whitespace
/// is collapsed. Plain text passes through unchanged apart from whitespace.
pub fn strip_markup(s: &str) -> String {
    if !s.contains('<') && !s.contains('&') {
        return collapse_whitespace(s);
    }
    let fragment = Html::parse_fragment(s);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Normalized key used to spot the same headline twice.
///
/// Lowercases, removes every non-word character and keeps the first 50
/// characters.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(title_key("Patch 11.2: Notes!"), "patch112notes");
/// ```
pub fn title_key(title: &str) -> String {
    RE_NON_WORD
        .replace_all(&title.to_lowercase(), "")
        .chars()
        .take(50)
        .collect()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_preview_is_char_safe() {
        assert_eq!(truncate_preview("short", 200), "short");
        assert_eq!(truncate_preview("ééééé", 3), "ééé...");
        assert_eq!(truncate_preview(&"b".repeat(201), 200), format!("{}...", "b".repeat(200)));
        assert_eq!(truncate_preview(&"b".repeat(200), 200), "b".repeat(200));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<p>Hotfixes&nbsp;are <b>live</b></p>\n\n<p>now</p>"),
            "Hotfixes are live now"
        );
        assert_eq!(strip_markup("  plain   text  "), "plain text");
    }

    #[test]
    fn test_title_key() {
        assert_eq!(title_key("Patch 11.2: Notes!"), "patch112notes");
        assert_eq!(title_key(&"x".repeat(80)).len(), 50);
        assert_eq!(title_key("Mythic+ Week"), title_key("mythic  week"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
