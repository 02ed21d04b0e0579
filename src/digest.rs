//! Scheduled reset summaries.
//!
//! Reset-relevant posts are bucketed by timing (this week, next week,
//! general) and articles by topic. The Monday warning carries both; the
//! Tuesday checklist carries posts only.

use crate::config::Limits;
use crate::models::{DigestKind, Item};
use crate::utils::{title_key, truncate_preview};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;

const THIS_WEEK_TERMS: &[&str] = &["this week", "starting", "begins", "today", "tomorrow"];
const NEXT_WEEK_TERMS: &[&str] = &["next week", "upcoming", "coming", "soon"];

const MYTHIC_PLUS_TERMS: &[&str] = &["mythic+", "mythic plus", "m+", "affix", "dungeon"];
const RAID_TERMS: &[&str] = &["raid", "tier set", "manaforge", "dimensius"];
const PATCH_TERMS: &[&str] = &["hotfix", "patch", "tuning", "nerf", "buff"];
const EVENT_TERMS: &[&str] = &["event", "timewalking", "world boss", "bonus"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEntry {
    pub title: String,
    pub url: String,
    pub preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub this_week: Vec<PostEntry>,
    pub next_week: Vec<PostEntry>,
    pub general: Vec<PostEntry>,
}

impl PostSummary {
    pub fn len(&self) -> usize {
        self.this_week.len() + self.next_week.len() + self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleEntry {
    pub title: String,
    pub url: String,
    pub posted_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub mythic_plus: Vec<ArticleEntry>,
    pub raids: Vec<ArticleEntry>,
    pub patches: Vec<ArticleEntry>,
    pub events: Vec<ArticleEntry>,
    pub general: Vec<ArticleEntry>,
}

impl ArticleSummary {
    pub fn len(&self) -> usize {
        self.buckets().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep at most `per_category` entries in each bucket.
    pub fn capped(mut self, per_category: usize) -> Self {
        for bucket in self.buckets_mut() {
            bucket.truncate(per_category);
        }
        self
    }

    fn buckets(&self) -> impl Iterator<Item = &Vec<ArticleEntry>> {
        [
            &self.mythic_plus,
            &self.raids,
            &self.patches,
            &self.events,
            &self.general,
        ]
        .into_iter()
    }

    fn buckets_mut(&mut self) -> impl Iterator<Item = &mut Vec<ArticleEntry>> {
        [
            &mut self.mythic_plus,
            &mut self.raids,
            &mut self.patches,
            &mut self.events,
            &mut self.general,
        ]
        .into_iter()
    }
}

/// A scheduled summary ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub kind: DigestKind,
    pub generated_at: DateTime<Utc>,
    pub posts: PostSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<ArticleSummary>,
}

impl Digest {
    /// Assemble a digest from already filtered reset-relevant items.
    ///
    /// `articles` is ignored for the checklist.
    pub fn build(kind: DigestKind, posts: &[Item], articles: &[Item], limits: &Limits) -> Self {
        let articles = match kind {
            DigestKind::ResetWarning => {
                Some(summarize_articles(articles).capped(limits.digest_per_category))
            }
            DigestKind::ResetChecklist => None,
        };
        Self {
            kind,
            generated_at: Utc::now(),
            posts: summarize_posts(posts, limits.summary_preview_chars),
            articles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.articles.as_ref().is_none_or(ArticleSummary::is_empty)
    }
}

fn mentions(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Bucket posts by when their content lands.
pub fn summarize_posts(posts: &[Item], preview_chars: usize) -> PostSummary {
    let mut summary = PostSummary::default();
    for item in posts.iter().unique_by(|i| i.identity()) {
        let text = format!("{} {}", item.title, item.preview).to_lowercase();
        let entry = PostEntry {
            title: item.title.clone(),
            url: item.url.clone(),
            preview: truncate_preview(&item.preview, preview_chars),
        };
        if mentions(&text, THIS_WEEK_TERMS) {
            summary.this_week.push(entry);
        } else if mentions(&text, NEXT_WEEK_TERMS) {
            summary.next_week.push(entry);
        } else {
            summary.general.push(entry);
        }
    }
    summary
}

/// Bucket articles by topic, judged on the title. Near-duplicate titles
/// are collapsed.
pub fn summarize_articles(articles: &[Item]) -> ArticleSummary {
    let mut summary = ArticleSummary::default();
    for item in articles.iter().unique_by(|i| title_key(&i.title)) {
        let title = item.title.to_lowercase();
        let entry = ArticleEntry {
            title: item.title.clone(),
            url: item.url.clone(),
            posted_at: item.posted_at.clone(),
        };
        let bucket = if mentions(&title, MYTHIC_PLUS_TERMS) {
            &mut summary.mythic_plus
        } else if mentions(&title, RAID_TERMS) {
            &mut summary.raids
        } else if mentions(&title, PATCH_TERMS) {
            &mut summary.patches
        } else if mentions(&title, EVENT_TERMS) {
            &mut summary.events
        } else {
            &mut summary.general
        };
        bucket.push(entry);
    }
    summary
}
