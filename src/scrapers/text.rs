//! Generic text strategy.
//!
//! Last resort before static filler: treat the page as plain text and pick
//! out lines that read like headlines, meaning lines of headline length
//! that mention the source's vocabulary.

use super::{ExtractContext, Strategy, StrategyKind};
use crate::models::Item;
use crate::utils::{collapse_whitespace, title_key};
use scraper::{Html, Node};
use std::collections::HashSet;
use tracing::debug;

/// Headline length window, exclusive on both ends.
const MIN_LINE_CHARS: usize = 20;
const MAX_LINE_CHARS: usize = 100;

/// Lines mentioning these are page chrome.
const CHROME_WORDS: &[&str] = &["menu", "navigation", "footer", "header"];

/// Elements whose text is never visible prose.
const SKIPPED_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that flow inside a line instead of starting a new one.
const INLINE_ELEMENTS: &[&str] = &[
    "a",
    "abbr",
    "b",
    "cite",
    "code",
    "em",
    "font",
    "i",
    "label",
    "mark",
    "q",
    "s",
    "small",
    "span",
    "strong",
    "sub",
    "sup",
    "time",
    "u",
];

pub struct GenericText;

impl Strategy for GenericText {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item> {
        let profile = ctx.profile;
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for line in visible_lines(document) {
            if !looks_like_headline(&line, profile.headline_keywords) {
                continue;
            }
            let key = title_key(&line);
            if key.is_empty() || !seen.insert(key.clone()) {
                continue;
            }

            let url = profile.search_link(&line);
            let mut item = Item::new(line, url, ctx.fetched_at);
            item.id = Some(format!("text_{key}"));
            items.push(item);

            if items.len() >= ctx.limits.text_items {
                break;
            }
        }

        debug!(count = items.len(), "Text scan finished");
        items
    }
}

/// Every non-empty visible text line, in document order.
fn visible_lines(document: &Html) -> Vec<String> {
    visible_text(document)
        .lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect()
}

/// The page's visible text. Text runs inside the same block element are
/// joined; a new block element or `<br>` starts a new line.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    let mut block = None;
    for node in document.root_element().descendants() {
        match node.value() {
            Node::Element(el) if el.name() == "br" => text.push('\n'),
            Node::Text(run) => {
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element())
                    .is_some_and(|el| SKIPPED_PARENTS.contains(&el.name()));
                if hidden {
                    continue;
                }
                let owner = node
                    .ancestors()
                    .find(|a| {
                        a.value()
                            .as_element()
                            .is_some_and(|el| !INLINE_ELEMENTS.contains(&el.name()))
                    })
                    .map(|a| a.id());
                if owner != block {
                    text.push('\n');
                    block = owner;
                }
                text.push_str(run);
            }
            _ => {}
        }
    }
    text
}

/// Headline-length line that uses the feed's vocabulary and is not chrome.
pub fn looks_like_headline(line: &str, keywords: &[&str]) -> bool {
    let len = line.chars().count();
    if len <= MIN_LINE_CHARS || len >= MAX_LINE_CHARS {
        return false;
    }
    let lower = line.to_lowercase();
    keywords.iter().any(|k| lower.contains(k)) && !CHROME_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::models::SourceKind;
    use crate::sources::SourceProfile;
    use chrono::Utc;

    fn run(html: &str, limits: &Limits) -> Vec<Item> {
        let profile = SourceProfile::for_kind(SourceKind::News, None);
        let ctx = ExtractContext {
            profile: &profile,
            limits,
            fetched_at: Utc::now(),
        };
        GenericText.extract(&Html::parse_document(html), &ctx)
    }

    #[test]
    fn test_picks_headline_lines() {
        let html = r#"<html><head><script>var raid = "Mythic raid data blob for scripts only";</script></head>
            <body>
              <div>Mythic+ Season 3 Dungeon Pool Revealed</div>
              <div>Main navigation: raid guides and more</div>
              <div>Raid</div>
              <div>Short patch</div>
              <div>mythic+ season 3 dungeon pool revealed!</div>
              <div>Hotfixes for August 23rd: Class Tuning and Bug Fixes</div>
            </body></html>"#;
        let items = run(html, &Limits::default());
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Mythic+ Season 3 Dungeon Pool Revealed",
                "Hotfixes for August 23rd: Class Tuning and Bug Fixes"
            ]
        );
        assert_eq!(
            items[0].id.as_deref(),
            Some("text_mythicseason3dungeonpoolrevealed")
        );
        assert_eq!(
            items[0].url,
            "https://www.wowhead.com/search?q=Mythic%2B%20Season%203%20Dungeon%20Pool%20Revealed"
        );
    }

    #[test]
    fn test_headline_split_across_inline_elements() {
        let html = r#"<html><body>
              <h2><a href="/news/1">Mythic+ Season 3</a> Dungeon Pool Revealed</h2>
              <p><b>Hotfixes</b> for August 23rd: <em>Class Tuning</em> and Bug Fixes</p>
              <div>Raid tier set bonuses<br>are getting adjusted again soon</div>
            </body></html>"#;
        let items = run(html, &Limits::default());
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Mythic+ Season 3 Dungeon Pool Revealed",
                "Hotfixes for August 23rd: Class Tuning and Bug Fixes",
                "Raid tier set bonuses",
            ]
        );
    }

    #[test]
    fn test_cap_and_length_window() {
        let lines: String = (0..10)
            .map(|i| format!("<p>Weekly raid roundup number {i} is here</p>"))
            .collect();
        let html = format!(
            "<html><body><p>{}</p>{lines}</body></html>",
            format!("raid {}", "x".repeat(120))
        );
        let items = run(&html, &Limits::default());
        assert_eq!(items.len(), Limits::default().text_items);
        assert!(items[0].title.starts_with("Weekly raid roundup number 0"));
    }

    #[test]
    fn test_looks_like_headline() {
        let kw = &["raid"];
        assert!(looks_like_headline("The new raid opens next Tuesday", kw));
        assert!(!looks_like_headline("raid", kw));
        assert!(!looks_like_headline("The footer mentions the raid twice", kw));
        assert!(!looks_like_headline("Nothing relevant in this sentence", kw));
    }
}
