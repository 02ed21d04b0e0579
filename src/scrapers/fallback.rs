//! Static fallback strategy.
//!
//! When every live tier comes up empty (usually because the page layout
//! changed under us) the profile's evergreen reference items are returned
//! instead. They are always marked `synthetic` so downstream consumers can
//! tell them apart from scraped content.

use super::{ExtractContext, Strategy, StrategyKind};
use crate::models::Item;
use scraper::Html;
use tracing::warn;

pub struct StaticFallback;

impl Strategy for StaticFallback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Static
    }

    fn extract(&self, _document: &Html, ctx: &ExtractContext<'_>) -> Vec<Item> {
        let entries = ctx.profile.static_entries;
        if !entries.is_empty() {
            warn!(
                source = %ctx.profile.kind,
                count = entries.len(),
                "All live extraction tiers failed; using static fallback items"
            );
        }
        entries
            .iter()
            .map(|entry| Item {
                id: Some(entry.id.to_string()),
                title: entry.title.to_string(),
                author: entry.author.to_string(),
                posted_at: String::new(),
                url: entry.url.to_string(),
                preview: entry.preview.to_string(),
                image_url: None,
                region: None,
                fetched_at: ctx.fetched_at,
                synthetic: true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::models::SourceKind;
    use crate::sources::SourceProfile;
    use chrono::Utc;

    #[test]
    fn test_static_items_are_synthetic_and_stable() {
        let profile = SourceProfile::for_kind(SourceKind::News, None);
        let limits = Limits::default();
        let ctx = ExtractContext {
            profile: &profile,
            limits: &limits,
            fetched_at: Utc::now(),
        };
        let doc = Html::parse_document("");
        let first = StaticFallback.extract(&doc, &ctx);
        let second = StaticFallback.extract(&doc, &ctx);

        assert_eq!(first.len(), profile.static_entries.len());
        assert!(first.iter().all(|i| i.synthetic && i.id.is_some()));
        let ids = |items: &[Item]| items.iter().map(Item::identity).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}
