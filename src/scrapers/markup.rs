//! Structural-markup strategy.
//!
//! When the data block is missing, posts are still linked from the listing.
//! Content links are recognised by their `href`, titles come from the
//! anchor text, and the surrounding card is searched for labeled elements
//! (`time`, `*author*`, a `<p>` snippet) and a thumbnail.

use super::{ExtractContext, Strategy, StrategyKind, images};
use crate::models::{Item, UNKNOWN_AUTHOR};
use crate::sources::SourceProfile;
use crate::utils::{collapse_whitespace, truncate_preview};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How many ancestors of a link are searched for author/time/snippet labels.
const LABEL_SEARCH_DEPTH: usize = 3;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static P_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static TIME_CLASS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="time"]"#).unwrap());
static AUTHOR_CLASS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="author"]"#).unwrap());
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

pub struct StructuralMarkup;

/// Labels recovered from the elements around a link.
#[derive(Debug, Default, PartialEq)]
struct CardLabels {
    author: Option<String>,
    posted: Option<String>,
    snippet: Option<String>,
}

impl Strategy for StructuralMarkup {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Markup
    }

    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item> {
        let profile = ctx.profile;

        // Document order of every node, and of every image, so a link's
        // nearest preceding/following image can be found.
        let mut positions = HashMap::new();
        let mut image_positions: Vec<(usize, String)> = Vec::new();
        for (idx, node) in document.root_element().descendants().enumerate() {
            positions.insert(node.id(), idx);
            if let Some(el) = ElementRef::wrap(node) {
                if el.value().name() == "img" {
                    if let Some(src) = el.value().attr("src") {
                        image_positions.push((idx, src.to_string()));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for anchor in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !is_content_href(href, profile) {
                continue;
            }

            let Some(title) = anchor_title(&anchor) else {
                continue;
            };
            let Some(url) = profile.resolve(href) else {
                continue;
            };
            if !seen.insert(format!("{url}|{title}")) {
                continue;
            }

            let labels = card_labels(&anchor, profile);
            let image_url = parent_image(&anchor, ctx).or_else(|| {
                let pos = positions.get(&anchor.id()).copied()?;
                nearest_image(&image_positions, pos, ctx)
            });

            let mut item = Item::new(title, url, ctx.fetched_at);
            if profile.ids_from_url {
                item.id = profile.id_from_url(&item.url);
            }
            item.author = labels.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
            item.posted_at = labels.posted.unwrap_or_default();
            item.preview = labels
                .snippet
                .map(|s| truncate_preview(&s, ctx.limits.preview_chars))
                .unwrap_or_default();
            item.image_url = image_url;
            items.push(item);

            if items.len() >= ctx.limits.markup_items {
                break;
            }
        }

        debug!(count = items.len(), "Markup scan finished");
        items
    }
}

/// Whether a link points at a post or article rather than page chrome.
fn is_content_href(href: &str, profile: &SourceProfile) -> bool {
    profile.link_patterns.iter().any(|p| href.contains(p)) && !profile.is_listing_link(href)
}

/// Anchor text, or its `title` attribute when the text is too short.
fn anchor_title(anchor: &ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&anchor.text().collect::<String>());
    if text.chars().count() >= crate::models::MIN_TITLE_CHARS {
        return Some(text);
    }
    let attr = collapse_whitespace(anchor.value().attr("title").unwrap_or(""));
    (attr.chars().count() >= crate::models::MIN_TITLE_CHARS).then_some(attr)
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Search the nearest ancestors for author, time and snippet labels.
///
/// The closest ancestor that has a given label wins. The search stops at
/// the first ancestor that also wraps another content link, since its
/// labels belong to a different card.
fn card_labels(anchor: &ElementRef<'_>, profile: &SourceProfile) -> CardLabels {
    let mut labels = CardLabels::default();

    for ancestor in anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(LABEL_SEARCH_DEPTH)
    {
        let links = ancestor
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| is_content_href(href, profile))
            .count();
        if links > 1 {
            break;
        }
        if labels.snippet.is_none() {
            labels.snippet = ancestor
                .select(&P_SELECTOR)
                .map(element_text)
                .find(|t| !t.is_empty());
        }
        if labels.posted.is_none() {
            labels.posted = ancestor
                .select(&TIME_SELECTOR)
                .chain(ancestor.select(&TIME_CLASS_SELECTOR))
                .find_map(|el| {
                    let value = el
                        .value()
                        .attr("datetime")
                        .map(str::trim)
                        .map(str::to_string)
                        .unwrap_or_else(|| element_text(el));
                    (!value.is_empty()).then_some(value)
                });
        }
        if labels.author.is_none() {
            labels.author = ancestor
                .select(&AUTHOR_CLASS_SELECTOR)
                .map(element_text)
                .find(|t| !t.is_empty());
        }
    }
    labels
}

/// First valid image inside the link's direct parent.
fn parent_image(anchor: &ElementRef<'_>, ctx: &ExtractContext<'_>) -> Option<String> {
    let parent = anchor.parent().and_then(ElementRef::wrap)?;
    parent
        .select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .find_map(|src| images::accept_image(src, ctx.profile))
}

/// The closest image before the link, else the closest after it.
fn nearest_image(
    image_positions: &[(usize, String)],
    pos: usize,
    ctx: &ExtractContext<'_>,
) -> Option<String> {
    let before = image_positions.iter().rev().find(|(i, _)| *i < pos);
    let after = image_positions.iter().find(|(i, _)| *i > pos);
    [before, after]
        .into_iter()
        .flatten()
        .find_map(|(_, src)| images::accept_image(src, ctx.profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::models::SourceKind;
    use chrono::Utc;

    fn run(html: &str, kind: SourceKind, limits: &Limits) -> Vec<Item> {
        let profile = SourceProfile::for_kind(kind, None);
        let ctx = ExtractContext {
            profile: &profile,
            limits,
            fetched_at: Utc::now(),
        };
        StructuralMarkup.extract(&Html::parse_document(html), &ctx)
    }

    const LISTING: &str = r#"<html><body>
        <nav><a href="/blue-tracker">Blue Tracker</a><a href="/blue-tracker?region=eu">EU</a></nav>
        <div class="post-card">
          <img src="https://wow.zamimg.com/uploads/screenshots/hotfix.jpg">
          <a href="/blue-tracker/topic/us/hotfixes-1">  Hotfixes:
              August 23rd </a>
          <span class="post-author">Kaivax</span>
          <time datetime="2025-08-23T12:51:17Z">2 hours ago</time>
          <p>Fixed an issue where raid bosses dropped no loot.</p>
        </div>
        <div class="post-card">
          <a href="https://www.wowhead.com/news/class-tuning-377" title="Class Tuning Incoming"><img src="/images/icon-small.png"></a>
          <div class="timestamp">Yesterday</div>
        </div>
        <a href="/guides/unrelated">Some guide link</a>
        <a href="/blue-tracker/topic/us/hotfixes-1">Hotfixes: August 23rd</a>
    </body></html>"#;

    #[test]
    fn test_extracts_cards() {
        let items = run(LISTING, SourceKind::Posts, &Limits::default());
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Hotfixes: August 23rd");
        assert_eq!(first.url, "https://www.wowhead.com/blue-tracker/topic/us/hotfixes-1");
        assert_eq!(first.author, "Kaivax");
        assert_eq!(first.posted_at, "2025-08-23T12:51:17Z");
        assert_eq!(first.preview, "Fixed an issue where raid bosses dropped no loot.");
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://wow.zamimg.com/uploads/screenshots/hotfix.jpg")
        );
        assert!(first.id.is_none());

        let second = &items[1];
        assert_eq!(second.title, "Class Tuning Incoming");
        assert_eq!(second.author, UNKNOWN_AUTHOR);
        assert_eq!(second.posted_at, "Yesterday");
    }

    #[test]
    fn test_news_ids_come_from_url() {
        let items = run(LISTING, SourceKind::News, &Limits::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("class-tuning-377"));
    }

    #[test]
    fn test_respects_item_cap() {
        let links: String = (0..20)
            .map(|i| format!(r#"<li><a href="/blue-tracker/topic/{i}">Topic number {i}</a></li>"#))
            .collect();
        let html = format!("<html><body><ul>{links}</ul></body></html>");
        let limits = Limits {
            markup_items: 4,
            ..Limits::default()
        };
        assert_eq!(run(&html, SourceKind::Posts, &limits).len(), 4);
    }

    #[test]
    fn test_nearest_image_before_then_after() {
        let html = r#"<html><body>
            <section><img src="https://example.com/avatar/1.png"></section>
            <section><span><a href="/blue-tracker/topic/9">Maintenance tonight</a></span></section>
            <section><img src="https://wow.zamimg.com/uploads/after.jpg"></section>
        </body></html>"#;
        let items = run(html, SourceKind::Posts, &Limits::default());
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://wow.zamimg.com/uploads/after.jpg")
        );
    }

    #[test]
    fn test_no_content_links() {
        let html = r#"<html><body><a href="/guides/x">A guide</a></body></html>"#;
        assert!(run(html, SourceKind::Posts, &Limits::default()).is_empty());
    }
}
