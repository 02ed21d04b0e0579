//! Item extraction from fetched listing pages.
//!
//! Third-party markup drifts, so extraction is a chain of strategies tried
//! in a fixed priority order. The first strategy that yields at least one
//! item wins, and later strategies are never invoked.
//!
//! # Tiers
//!
//! | Order | Strategy | Module | Reads |
//! |-------|----------|--------|-------|
//! | 1 | Embedded data | [`embedded`] | JSON block inside a `<script>` |
//! | 2 | Structural markup | [`markup`] | `<a>` / `<img>` patterns and nearby labels |
//! | 3 | Generic text | [`text`] | Plain-text lines that look like headlines |
//! | 4 | Static fallback | [`fallback`] | Fixed evergreen items, flagged synthetic |
//!
//! Whatever a strategy returns, items without a usable title are dropped
//! before the result leaves the [`Extractor`].

pub mod embedded;
pub mod fallback;
pub mod images;
pub mod markup;
pub mod text;

use crate::config::Limits;
use crate::models::Item;
use crate::sources::SourceProfile;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument};

/// Which tier produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Embedded,
    Markup,
    Text,
    Static,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Embedded => "embedded",
            StrategyKind::Markup => "markup",
            StrategyKind::Text => "text",
            StrategyKind::Static => "static",
        })
    }
}

/// Everything a strategy needs besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub profile: &'a SourceProfile,
    pub limits: &'a Limits,
    pub fetched_at: DateTime<Utc>,
}

/// One extraction tier.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Pull items out of `document`. An empty result hands over to the next tier.
    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item>;
}

/// Result of running the strategy chain.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The tier that produced `items`, or `None` when every tier came up empty.
    pub strategy: Option<StrategyKind>,
    pub items: Vec<Item>,
}

/// Ordered chain of extraction strategies.
pub struct Extractor {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(embedded::EmbeddedData),
            Box::new(markup::StructuralMarkup),
            Box::new(text::GenericText),
            Box::new(fallback::StaticFallback),
        ])
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.kind()))
            .finish()
    }
}

impl Extractor {
    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Parse `body` and run the chain over it.
    pub fn extract_body(&self, body: &str, ctx: &ExtractContext<'_>) -> Extraction {
        let document = Html::parse_document(body);
        self.extract(&document, ctx)
    }

    /// Run the chain, stopping at the first strategy that yields items.
    #[instrument(level = "debug", skip_all, fields(source = %ctx.profile.kind))]
    pub fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Extraction {
        for strategy in &self.strategies {
            let items: Vec<Item> = strategy
                .extract(document, ctx)
                .into_iter()
                .filter(Item::has_usable_title)
                .collect();
            if items.is_empty() {
                debug!(strategy = %strategy.kind(), "Strategy found nothing; falling through");
                continue;
            }
            info!(
                strategy = %strategy.kind(),
                count = items.len(),
                "Extracted items"
            );
            return Extraction {
                strategy: Some(strategy.kind()),
                items,
            };
        }
        Extraction {
            strategy: None,
            items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        kind: StrategyKind,
        calls: Arc<AtomicUsize>,
        titles: Vec<&'static str>,
    }

    impl Strategy for Counting {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn extract(&self, _document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.titles
                .iter()
                .map(|t| Item::new(*t, "https://example.com", ctx.fetched_at))
                .collect()
        }
    }

    fn counting(kind: StrategyKind, titles: Vec<&'static str>) -> (Box<dyn Strategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Counting {
            kind,
            calls: Arc::clone(&calls),
            titles,
        };
        (Box::new(strategy), calls)
    }

    #[test]
    fn test_stops_at_first_non_empty_strategy() {
        let (s1, c1) = counting(StrategyKind::Embedded, vec![]);
        let (s2, c2) = counting(StrategyKind::Markup, vec!["Hotfixes for today"]);
        let (s3, c3) = counting(StrategyKind::Text, vec!["Never seen"]);
        let (s4, c4) = counting(StrategyKind::Static, vec!["Never seen either"]);
        let extractor = Extractor::with_strategies(vec![s1, s2, s3, s4]);

        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let result = extractor.extract_body("<html></html>", &ctx);

        assert_eq!(result.strategy, Some(StrategyKind::Markup));
        assert_eq!(result.items.len(), 1);
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
        assert_eq!(c4.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_untitled_items_do_not_count_as_results() {
        let (s1, _) = counting(StrategyKind::Embedded, vec!["", "  ", "ab"]);
        let (s2, c2) = counting(StrategyKind::Markup, vec!["Real title"]);
        let extractor = Extractor::with_strategies(vec![s1, s2]);

        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let result = extractor.extract_body("", &ctx);

        assert_eq!(result.strategy, Some(StrategyKind::Markup));
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert!(result.items.iter().all(|i| !i.title.is_empty()));
    }

    #[test]
    fn test_all_empty_yields_empty_extraction() {
        let (s1, _) = counting(StrategyKind::Embedded, vec![]);
        let extractor = Extractor::with_strategies(vec![s1]);
        let profile = SourceProfile::for_kind(SourceKind::News, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let result = extractor.extract_body("<p>nothing</p>", &ctx);
        assert!(result.strategy.is_none());
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_malformed_embedded_block_falls_to_markup() {
        let html = r#"<html><body>
            <script>{"entries": [ {"title": "Broken JSON" , </script>
            <ul>
              <li class="post"><a href="/blue-tracker/topic/us/hotfixes-123">Hotfixes: August 23rd</a>
                  <span class="author-name">Kaivax</span></li>
            </ul>
            <p>Mythic dungeon season patch notes are a long line of page text</p>
        </body></html>"#;
        let profile = SourceProfile::for_kind(SourceKind::Posts, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let result = Extractor::default().extract_body(html, &ctx);

        assert_eq!(result.strategy, Some(StrategyKind::Markup));
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].title, "Hotfixes: August 23rd");
        assert_eq!(result.items[0].author, "Kaivax");
        assert!(result.items.iter().all(|i| !i.synthetic));
    }

    #[test]
    fn test_empty_page_falls_back_to_static_items() {
        let profile = SourceProfile::for_kind(SourceKind::News, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let result = Extractor::default().extract_body("<html><body></body></html>", &ctx);
        assert_eq!(result.strategy, Some(StrategyKind::Static));
        assert!(!result.items.is_empty());
        assert!(result.items.iter().all(|i| i.synthetic));
    }
}
