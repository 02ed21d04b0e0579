//! Data models shared by the extractor, classifier, cache and scheduler.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Item`]: one normalized post or article produced by the extractor
//! - [`RawEntry`]: a single entry of the embedded data block, before normalization
//! - [`SourceKind`] / [`DigestKind`]: the monitored feeds and the scheduled digests
//!
//! Items are transient: they are rebuilt from the live page on every tick and
//! only their identity string survives, inside the dedup cache.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest title any extraction tier will accept.
pub const MIN_TITLE_CHARS: usize = 3;

/// Author recorded when the source does not name one.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Absolute `posted_at` layouts: the raw listing format and its rendering.
const POSTED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%B %d, %Y at %I:%M %p"];

/// A normalized post or article.
///
/// # Identity
///
/// Deduplication keys off [`Item::identity`]: the explicit `id` when the
/// source supplied one, otherwise a composite of title, author and posting
/// time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Item {
    /// Stable identifier supplied by the source, if any.
    pub id: Option<String>,
    /// Headline. Always at least [`MIN_TITLE_CHARS`] characters.
    pub title: String,
    /// Author name, or [`UNKNOWN_AUTHOR`].
    pub author: String,
    /// Source-provided posting time, loosely formatted.
    pub posted_at: String,
    /// Absolute link to the item, or a search link when none could be resolved.
    pub url: String,
    /// Tag-stripped, truncated body text.
    pub preview: String,
    /// Absolute URL of a content image.
    pub image_url: Option<String>,
    /// Lowercase region code declared by the source.
    pub region: Option<String>,
    /// When this item was scraped.
    pub fetched_at: DateTime<Utc>,
    /// Set for static fallback filler that was not scraped from the live page.
    #[serde(default)]
    pub synthetic: bool,
}

impl Item {
    /// Build an item with just a title and URL; everything else takes defaults.
    pub fn new(title: impl Into<String>, url: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            posted_at: String::new(),
            url: url.into(),
            preview: String::new(),
            image_url: None,
            region: None,
            fetched_at,
            synthetic: false,
        }
    }

    /// The string used to deduplicate this item across ticks.
    pub fn identity(&self) -> String {
        match self.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => format!("id_{id}"),
            None => format!("{}_{}_{}", self.title, self.author, self.posted_at),
        }
    }

    /// `posted_at` as a UTC time, when it is in one of the formats the
    /// extractor produces. Relative times like "2 hours ago" give `None`.
    pub fn posted_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.posted_at.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        POSTED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(|dt| dt.and_utc())
    }

    /// Whether the title satisfies the item invariant.
    pub fn has_usable_title(&self) -> bool {
        self.title.trim().chars().count() >= MIN_TITLE_CHARS
    }
}

/// A loosely typed scalar from third-party JSON.
///
/// Ids and timestamps show up as strings on some entries and as numbers on
/// others, so both are accepted and rendered back to text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl Scalar {
    /// Truthiness the way the upstream page uses it (`1`, `true`, `"yes"`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Text(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
            Scalar::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Scalar::Flag(b) => *b,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// One entry of the embedded data block, exactly as the page ships it.
///
/// Every field is optional. The accessors below encode the fallback order
/// for the fields that have synonyms; empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    pub id: Option<Scalar>,
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub posted: Option<Scalar>,
    pub timestamp: Option<Scalar>,
    pub body: Option<String>,
    pub region: Option<String>,
    pub image: Option<String>,
    pub banner: Option<String>,
    pub thumbnail: Option<String>,
    pub img: Option<String>,
    pub url: Option<String>,
    pub link: Option<String>,
    pub source_url: Option<String>,
    pub news: Option<Scalar>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl RawEntry {
    pub fn title(&self) -> &str {
        non_empty(&self.title).unwrap_or("")
    }

    /// `author`, then `userName`, then [`UNKNOWN_AUTHOR`].
    pub fn author(&self) -> &str {
        non_empty(&self.author)
            .or_else(|| non_empty(&self.user_name))
            .unwrap_or(UNKNOWN_AUTHOR)
    }

    /// `posted`, then `timestamp`.
    pub fn posted(&self) -> String {
        self.posted
            .iter()
            .chain(self.timestamp.iter())
            .map(|s| s.to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<String> {
        self.id.as_ref().map(|s| s.to_string()).filter(|s| !s.is_empty())
    }

    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    pub fn region(&self) -> Option<String> {
        non_empty(&self.region).map(str::to_lowercase)
    }

    /// `image`, then `banner`, then `thumbnail`, then `img`.
    pub fn image_candidate(&self) -> Option<&str> {
        [&self.image, &self.banner, &self.thumbnail, &self.img]
            .into_iter()
            .find_map(non_empty)
    }

    /// `url`, then `link`, then `source_url`.
    pub fn url_candidate(&self) -> Option<&str> {
        [&self.url, &self.link, &self.source_url]
            .into_iter()
            .find_map(non_empty)
    }

    /// Whether the entry is flagged as a news article rather than a forum post.
    pub fn is_news(&self) -> bool {
        self.news.as_ref().is_some_and(Scalar::is_truthy)
    }
}

/// The monitored feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Official developer posts from the blue tracker.
    Posts,
    /// Articles from the news feed.
    News,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Posts => "posts",
            SourceKind::News => "news",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduled summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DigestKind {
    /// Pre-reset warning: reset-relevant posts plus a news roundup.
    ResetWarning,
    /// Reset-day checklist: reset-relevant posts only.
    ResetChecklist,
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestKind::ResetWarning => "reset-warning",
            DigestKind::ResetChecklist => "reset-checklist",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_prefers_explicit_id() {
        let mut item = Item::new("Hotfixes: August 23", "https://example.com", Utc::now());
        item.id = Some("12345".to_string());
        assert_eq!(item.identity(), "id_12345");
    }

    #[test]
    fn test_identity_falls_back_to_composite() {
        let mut item = Item::new("Hotfixes: August 23", "https://example.com", Utc::now());
        item.author = "Kaivax".to_string();
        item.posted_at = "2 hours ago".to_string();
        assert_eq!(item.identity(), "Hotfixes: August 23_Kaivax_2 hours ago");

        item.id = Some(String::new());
        assert_eq!(item.identity(), "Hotfixes: August 23_Kaivax_2 hours ago");
    }

    #[test]
    fn test_posted_time_formats() {
        let mut item = Item::new("Hotfixes: August 23", "https://example.com", Utc::now());
        let expected = Utc.with_ymd_and_hms(2025, 8, 23, 12, 51, 0).unwrap();

        for raw in [
            "2025-08-23 12:51:00",
            "August 23, 2025 at 12:51 PM",
            "2025-08-23T12:51:00Z",
            "2025-08-23T14:51:00+02:00",
        ] {
            item.posted_at = raw.to_string();
            assert_eq!(item.posted_time(), Some(expected), "{raw}");
        }

        item.posted_at = "2025-08-23".to_string();
        assert_eq!(
            item.posted_time(),
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 0, 0, 0).unwrap())
        );

        item.posted_at = "2 hours ago".to_string();
        assert!(item.posted_time().is_none());
        item.posted_at = String::new();
        assert!(item.posted_time().is_none());
    }

    #[test]
    fn test_raw_entry_fallback_order() {
        let entry: RawEntry = serde_json::from_str(
            r#"{
                "id": 987654,
                "title": "Class Tuning Incoming",
                "userName": "Linxy",
                "timestamp": "2025-08-23 12:51:17",
                "banner": "",
                "thumbnail": "https://wow.zamimg.com/uploads/thumb.jpg",
                "link": "/news/987654",
                "source_url": "https://example.com/ignored",
                "news": 1
            }"#,
        )
        .unwrap();

        assert_eq!(entry.id().as_deref(), Some("987654"));
        assert_eq!(entry.author(), "Linxy");
        assert_eq!(entry.posted(), "2025-08-23 12:51:17");
        assert_eq!(
            entry.image_candidate(),
            Some("https://wow.zamimg.com/uploads/thumb.jpg")
        );
        assert_eq!(entry.url_candidate(), Some("/news/987654"));
        assert!(entry.is_news());
    }

    #[test]
    fn test_raw_entry_defaults() {
        let entry: RawEntry = serde_json::from_str(r#"{"title": "Hello there"}"#).unwrap();
        assert_eq!(entry.author(), UNKNOWN_AUTHOR);
        assert_eq!(entry.posted(), "");
        assert!(entry.id().is_none());
        assert!(entry.region().is_none());
        assert!(!entry.is_news());
    }

    #[test]
    fn test_item_serialization_flags_synthetic() {
        let mut item = Item::new("Great Vault Guide", "https://example.com", Utc::now());
        item.synthetic = true;
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"synthetic\":true"));
    }

    #[test]
    fn test_source_kind_names() {
        assert_eq!(SourceKind::Posts.to_string(), "posts");
        assert_eq!(SourceKind::News.as_str(), "news");
        assert_eq!(DigestKind::ResetWarning.to_string(), "reset-warning");
    }
}
