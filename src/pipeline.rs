//! The fetch → extract → filter → classify → dedup → deliver pipeline.
//!
//! [`Herald`] ties the pieces together for both sources and is the
//! scheduler's [`ActionHandler`]. It also backs the on-demand CLI commands:
//!
//! | Operation | Cache | Delivers |
//! |-----------|-------|----------|
//! | [`Herald::monitor`] | diff + first-run policy | new items (news: priority only) |
//! | [`Herald::check_new`] | diff | returns new items |
//! | [`Herald::latest`] | bypassed | returns a capped preview |
//! | [`Herald::digest`] | bypassed | returns a reset digest |
//! | [`Herald::diagnose`] | read only | returns extraction diagnostics |

use crate::cache::{CacheError, DedupCache, Fresh};
use crate::config::Config;
use crate::digest::Digest;
use crate::fetcher::{FetchError, FetchPage};
use crate::models::{DigestKind, Item, SourceKind};
use crate::outputs::{Notification, Sink};
use crate::relevance::{is_priority_relevant, is_relevant, matches_region};
use crate::scheduler::{Action, ActionHandler};
use crate::scrapers::images::banner_from_page;
use crate::scrapers::{ExtractContext, Extractor, StrategyKind};
use crate::sources::SourceProfile;
use chrono::{Duration, Utc};
use scraper::Html;
use serde::Serialize;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

/// Path segment of article pages, the only pages that carry a banner.
const ARTICLE_PATH: &str = "/news/";

/// One monitored source: where to read it and what has been delivered.
#[derive(Debug)]
pub struct Source {
    pub profile: SourceProfile,
    pub cache: DedupCache,
}

/// Items read from a source on one pass, after the region filter.
#[derive(Debug, Clone)]
pub struct Scan {
    pub strategy: Option<StrategyKind>,
    pub extracted: usize,
    pub region_dropped: usize,
    pub items: Vec<Item>,
}

/// What the `test` command reports about a source.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub source: SourceKind,
    pub url: String,
    pub strategy: Option<StrategyKind>,
    pub extracted: usize,
    pub region_dropped: usize,
    pub relevant: usize,
    pub priority: usize,
    pub synthetic: usize,
    pub first_run: bool,
    pub seen: usize,
    pub sample: Vec<String>,
}

pub struct Herald<F, S> {
    config: Config,
    fetcher: F,
    sink: S,
    extractor: Extractor,
    posts: Source,
    news: Source,
}

impl<F: FetchPage, S: Sink> Herald<F, S> {
    pub fn new(config: Config, fetcher: F, sink: S) -> Self {
        let source = |kind| Source {
            profile: SourceProfile::for_kind(kind, config.source_url(kind)),
            cache: DedupCache::new(&config.cache_dir, kind, config.limits.first_run_items),
        };
        let posts = source(SourceKind::Posts);
        let news = source(SourceKind::News);
        Self {
            fetcher,
            sink,
            extractor: Extractor::default(),
            posts,
            news,
            config,
        }
    }

    pub fn source(&self, kind: SourceKind) -> &Source {
        match kind {
            SourceKind::Posts => &self.posts,
            SourceKind::News => &self.news,
        }
    }

    pub fn cache(&self, kind: SourceKind) -> &DedupCache {
        &self.source(kind).cache
    }

    pub async fn deliver(&self, notification: Notification) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sink.deliver(&notification).await
    }

    /// Fetch and extract a source, dropping items for other regions.
    #[instrument(level = "info", skip_all, fields(source = %kind))]
    pub async fn scan(&self, kind: SourceKind) -> Result<Scan, FetchError> {
        let profile = &self.source(kind).profile;
        let page = self.fetcher.fetch(&profile.url).await?;
        debug!(url = %page.url, bytes = page.body.len(), "Parsing page");

        let ctx = ExtractContext {
            profile,
            limits: &self.config.limits,
            fetched_at: Utc::now(),
        };
        let extraction = self.extractor.extract_body(&page.body, &ctx);
        let extracted = extraction.items.len();

        let target = self.config.target_region();
        let items: Vec<Item> = extraction
            .items
            .into_iter()
            .filter(|item| matches_region(item, target.as_deref()))
            .collect();
        let region_dropped = extracted - items.len();
        if region_dropped > 0 {
            debug!(region_dropped, target = ?target, "Dropped items for other regions");
        }

        Ok(Scan {
            strategy: extraction.strategy,
            extracted,
            region_dropped,
            items,
        })
    }

    fn relevant(&self, kind: SourceKind, items: Vec<Item>) -> Vec<Item> {
        let official_only = self.config.official_authors_only;
        items
            .into_iter()
            .filter(|item| is_relevant(item, kind, official_only))
            .collect()
    }

    /// Relevant items the cache has not seen, recording all of them.
    ///
    /// Static fallback items never reach the cache.
    #[instrument(level = "info", skip_all, fields(source = %kind))]
    pub async fn check_new(&self, kind: SourceKind) -> Result<Fresh, Box<dyn Error + Send + Sync>> {
        let scan = self.scan(kind).await?;
        let (synthetic, live): (Vec<Item>, Vec<Item>) =
            scan.items.into_iter().partition(|item| item.synthetic);
        if !synthetic.is_empty() {
            warn!(count = synthetic.len(), "Live extraction failed; ignoring static items");
        }

        let candidates = self.relevant(kind, live);
        let fresh = self.cache(kind).diff(candidates).await?;
        info!(new = fresh.items.len(), first_run = fresh.first_run, "Checked for new items");
        Ok(fresh)
    }

    /// Scheduled monitoring: diff, then apply the delivery policy.
    ///
    /// A first run only records what is there unless `announce_first_run`
    /// is set. Sources marked `priority_only` deliver priority items only.
    #[instrument(level = "info", skip_all, fields(source = %kind))]
    pub async fn monitor(&self, kind: SourceKind) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let Fresh { mut items, first_run } = self.check_new(kind).await?;

        if first_run && !self.config.announce_first_run {
            info!(recorded = items.len(), "First run; recorded items without delivering");
            return Ok(0);
        }

        if self.source(kind).profile.priority_only {
            let before = items.len();
            items.retain(is_priority_relevant);
            if before > items.len() {
                info!(held_back = before - items.len(), "Held back non-priority items");
            }
        }

        if items.is_empty() {
            debug!("Nothing new to deliver");
            return Ok(0);
        }
        self.attach_banners(kind, &mut items).await;
        let count = items.len();
        self.deliver(Notification::NewItems { source: kind, items }).await?;
        Ok(count)
    }

    /// Current relevant items, bypassing the cache.
    #[instrument(level = "info", skip_all, fields(source = %kind))]
    pub async fn latest(&self, kind: SourceKind) -> Result<Vec<Item>, FetchError> {
        let scan = self.scan(kind).await?;
        let mut items = self.relevant(kind, scan.items);
        items.truncate(self.config.limits.preview_items);
        Ok(items)
    }

    /// Recent priority-relevant items for a digest.
    #[instrument(level = "info", skip_all, fields(source = %kind, days_back = days_back))]
    pub async fn reset_relevant(&self, kind: SourceKind, days_back: i64) -> Result<Vec<Item>, FetchError> {
        let scan = self.scan(kind).await?;
        let cutoff = Utc::now() - Duration::days(days_back);
        let mut items: Vec<Item> = self
            .relevant(kind, scan.items)
            .into_iter()
            .filter(|item| item.posted_time().is_none_or(|at| at >= cutoff))
            .filter(is_priority_relevant)
            .collect();
        if kind == SourceKind::News {
            items.truncate(self.config.limits.digest_articles);
        }
        debug!(count = items.len(), "Reset-relevant items");
        Ok(items)
    }

    /// Build a digest. A source that cannot be fetched contributes nothing.
    #[instrument(level = "info", skip_all, fields(kind = %kind))]
    pub async fn digest(&self, kind: DigestKind) -> Digest {
        let days_back = self.config.digest_days_back;
        let posts = self
            .reset_relevant(SourceKind::Posts, days_back)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Posts unavailable for digest");
                Vec::new()
            });
        let articles = match kind {
            DigestKind::ResetWarning => self
                .reset_relevant(SourceKind::News, days_back)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "News unavailable for digest");
                    Vec::new()
                }),
            DigestKind::ResetChecklist => Vec::new(),
        };
        Digest::build(kind, &posts, &articles, &self.config.limits)
    }

    /// Extraction diagnostics for a source. Reads the cache, never writes it.
    #[instrument(level = "info", skip_all, fields(source = %kind))]
    pub async fn diagnose(&self, kind: SourceKind) -> Result<Diagnostics, FetchError> {
        let scan = self.scan(kind).await?;
        let state = self.cache(kind).load().await;
        let synthetic = scan.items.iter().filter(|i| i.synthetic).count();
        let relevant = self.relevant(kind, scan.items);
        let priority = relevant.iter().filter(|i| is_priority_relevant(i)).count();

        Ok(Diagnostics {
            source: kind,
            url: self.source(kind).profile.url.clone(),
            strategy: scan.strategy,
            extracted: scan.extracted,
            region_dropped: scan.region_dropped,
            relevant: relevant.len(),
            priority,
            synthetic,
            first_run: state.is_first_run(),
            seen: state.seen_ids.len(),
            sample: relevant.iter().take(3).map(|i| i.title.clone()).collect(),
        })
    }

    pub async fn reset(&self, kind: SourceKind) -> Result<bool, CacheError> {
        self.cache(kind).reset().await
    }

    /// Look up banners for image-less news articles on their own pages.
    ///
    /// Only items about to be delivered should be passed in. At most
    /// `banner_lookups` pages are fetched; search links and non-article
    /// links are skipped.
    pub async fn attach_banners(&self, kind: SourceKind, items: &mut [Item]) {
        let profile = &self.source(kind).profile;
        let candidates = items
            .iter_mut()
            .filter(|item| {
                item.image_url.is_none()
                    && item.url.contains(ARTICLE_PATH)
                    && !item.url.starts_with(&profile.search_url)
            })
            .take(self.config.banner_lookups);

        for item in candidates {
            match self.fetcher.fetch(&item.url).await {
                Ok(page) => {
                    item.image_url = banner_in(&page.body, profile);
                    debug!(url = %item.url, found = item.image_url.is_some(), "Banner lookup");
                }
                Err(e) => debug!(url = %item.url, error = %e, "Banner lookup failed"),
            }
        }
    }
}

fn banner_in(body: &str, profile: &SourceProfile) -> Option<String> {
    banner_from_page(&Html::parse_document(body), profile)
}

impl<F: FetchPage, S: Sink> ActionHandler for Herald<F, S> {
    async fn handle(&self, action: Action) -> Result<(), Box<dyn Error + Send + Sync>> {
        match action {
            Action::Monitor(kind) => {
                self.monitor(kind).await?;
            }
            Action::Digest(kind) => {
                let digest = self.digest(kind).await;
                if digest.is_empty() {
                    info!(%kind, "Digest is empty; delivering anyway");
                }
                self.deliver(Notification::Digest(digest)).await?;
            }
        }
        Ok(())
    }
}
