//! Embedded-data strategy.
//!
//! The blue tracker ships its listing as a JSON object inside a `<script>`
//! tag, with the posts under a named list field (`entries`). When that
//! block is present it is the most complete source of truth: it carries ids,
//! regions, bodies and sometimes banner images.
//!
//! Each raw entry is decoded on its own, so one oddly shaped entry costs
//! that entry only.

use super::{ExtractContext, Strategy, StrategyKind, images};
use crate::models::{Item, RawEntry};
use crate::utils::{strip_markup, truncate_for_log, truncate_preview};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// Scripts shorter than this are config snippets, not the data block.
pub const MIN_SCRIPT_LEN: usize = 1000;

/// Titles this short are navigation noise rather than posts.
const MIN_ENTRY_TITLE_CHARS: usize = 6;

static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());

pub struct EmbeddedData;

impl Strategy for EmbeddedData {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Embedded
    }

    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item> {
        let Some(entries) = find_entries(document, ctx.profile.list_field) else {
            debug!("No embedded data block found");
            return Vec::new();
        };

        let total = entries.len();
        let items: Vec<Item> = entries
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<RawEntry>(raw) {
                Ok(entry) => item_from_entry(&entry, ctx),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable entry");
                    None
                }
            })
            .collect();
        debug!(total, kept = items.len(), "Decoded embedded entries");
        items
    }
}

/// Locate the embedded object and return its raw list entries.
///
/// Only the first script that decodes into an object with the list field
/// is used.
pub fn find_entries(document: &Html, list_field: &str) -> Option<Vec<Value>> {
    let needle = format!("\"{list_field}\"");
    let pattern = match Regex::new(&format!(r"(?s)\{{.*{}.*\}}", regex::escape(&needle))) {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, list_field, "Bad list field pattern");
            return None;
        }
    };

    for script in document.select(&SCRIPT_SELECTOR) {
        let content: String = script.text().collect();
        let content = content.trim();
        if content.len() <= MIN_SCRIPT_LEN || !content.contains(&needle) {
            continue;
        }
        let Some(m) = pattern.find(content) else {
            continue;
        };
        match serde_json::from_str::<Value>(m.as_str()) {
            Ok(mut data) => {
                if let Some(Value::Array(entries)) = data.get_mut(list_field).map(Value::take) {
                    return Some(entries);
                }
            }
            Err(e) => {
                debug!(
                    error = %e,
                    block = %truncate_for_log(m.as_str(), 120),
                    "Embedded block is not valid JSON"
                );
            }
        }
    }
    None
}

/// Map one raw entry to an [`Item`].
///
/// Returns `None` when the entry has no usable title.
pub fn item_from_entry(entry: &RawEntry, ctx: &ExtractContext<'_>) -> Option<Item> {
    let profile = ctx.profile;
    let title = entry.title();
    if title.chars().count() < MIN_ENTRY_TITLE_CHARS {
        return None;
    }

    let id = entry.id();
    let url = entry
        .url_candidate()
        .and_then(|u| profile.resolve(u))
        .or_else(|| id.as_deref().map(|id| profile.url_for_id(id, entry.is_news())))
        .unwrap_or_else(|| profile.search_link(title));

    let body = entry.body();
    let image_url = entry
        .image_candidate()
        .and_then(|src| images::accept_image(src, profile))
        .or_else(|| images::image_from_content(body, profile));

    Some(Item {
        id,
        title: title.to_string(),
        author: entry.author().to_string(),
        posted_at: format_posted(&entry.posted()),
        url,
        preview: truncate_preview(&strip_markup(body), ctx.limits.preview_chars),
        image_url,
        region: entry.region(),
        fetched_at: ctx.fetched_at,
        synthetic: false,
    })
}

/// Render `YYYY-MM-DD HH:MM:SS` as `August 23, 2025 at 12:51 PM`.
///
/// Anything else is passed through untouched.
pub fn format_posted(posted: &str) -> String {
    NaiveDateTime::parse_from_str(posted.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%B %d, %Y at %I:%M %p").to_string())
        .unwrap_or_else(|_| posted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::models::SourceKind;
    use crate::sources::SourceProfile;
    use chrono::Utc;

    fn page_with(script: &str) -> Html {
        Html::parse_document(&format!(
            "<html><head><script>{script}</script></head><body></body></html>"
        ))
    }

    fn padded_block(entries: &str) -> String {
        format!(
            r#"{{"entries": {entries}, "padding": "{}"}}"#,
            "x".repeat(MIN_SCRIPT_LEN)
        )
    }

    fn run(document: &Html, profile: &SourceProfile) -> Vec<Item> {
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        EmbeddedData.extract(document, &ctx)
    }

    #[test]
    fn test_extracts_entries() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let doc = page_with(&padded_block(
            r#"[
                {"id": 101, "title": "Hotfixes: August 23rd", "author": "Blizzard Entertainment",
                 "posted": "2025-08-23 12:51:17", "region": "US",
                 "body": "<p>Fixed an issue with <b>raid</b> loot.</p>",
                 "url": "/blue-tracker/topic/us/hotfixes-101"},
                {"id": 102, "title": "Short"},
                {"title": "Dungeon Tuning Incoming", "userName": "Linxy", "region": "eu"}
            ]"#,
        ));
        let items = run(&doc, &profile);
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id.as_deref(), Some("101"));
        assert_eq!(first.url, "https://www.wowhead.com/blue-tracker/topic/us/hotfixes-101");
        assert_eq!(first.posted_at, "August 23, 2025 at 12:51 PM");
        assert_eq!(first.preview, "Fixed an issue with raid loot.");
        assert_eq!(first.region.as_deref(), Some("us"));

        let second = &items[1];
        assert_eq!(second.author, "Linxy");
        assert_eq!(
            second.url,
            "https://www.wowhead.com/blue-tracker?search=Dungeon%20Tuning%20Incoming"
        );
        assert_eq!(second.region.as_deref(), Some("eu"));
    }

    #[test]
    fn test_url_synthesized_from_id() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let doc = page_with(&padded_block(
            r#"[{"id": "3712345", "title": "Season 3 Preview"},
                {"id": 42, "title": "Known Issues List"},
                {"id": 43, "title": "Housing Interview", "news": true}]"#,
        ));
        let items = run(&doc, &profile);
        assert_eq!(items[0].url, "https://www.wowhead.com/news/3712345");
        assert_eq!(items[1].url, "https://www.wowhead.com/blue-tracker/topic/42");
        assert_eq!(items[2].url, "https://www.wowhead.com/news/43");
    }

    #[test]
    fn test_image_fields_then_body() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let doc = page_with(&padded_block(
            r#"[{"title": "Patch Notes Banner", "thumbnail": "/uploads/thumb.jpg",
                 "body": "<img src=\"https://wow.zamimg.com/uploads/other.jpg\">"},
                {"title": "Patch Notes Body", "image": "https://example.com/avatar.png",
                 "body": "<img src=\"//wow.zamimg.com/uploads/body.jpg\">"}]"#,
        ));
        let items = run(&doc, &profile);
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://www.wowhead.com/uploads/thumb.jpg")
        );
        assert_eq!(
            items[1].image_url.as_deref(),
            Some("https://wow.zamimg.com/uploads/body.jpg")
        );
    }

    #[test]
    fn test_malformed_block_yields_nothing() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let broken = format!(
            r#"{{"entries": [{{"title": "Hotfixes", "padding": "{}" }}"#,
            "x".repeat(MIN_SCRIPT_LEN)
        );
        assert!(run(&page_with(&broken), &profile).is_empty());
    }

    #[test]
    fn test_short_scripts_are_ignored() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let doc = page_with(r#"{"entries": [{"title": "Hotfixes: August 23rd"}]}"#);
        assert!(run(&doc, &profile).is_empty());
    }

    #[test]
    fn test_bad_entry_does_not_spoil_the_rest() {
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let doc = page_with(&padded_block(
            r#"[{"title": ["not", "a", "string"]}, {"title": "Class Tuning Update"}]"#,
        ));
        let items = run(&doc, &profile);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Class Tuning Update");
    }

    #[test]
    fn test_format_posted() {
        assert_eq!(format_posted("2025-08-23 12:51:17"), "August 23, 2025 at 12:51 PM");
        assert_eq!(format_posted("2 hours ago"), "2 hours ago");
        assert_eq!(format_posted(""), "");
    }
}
