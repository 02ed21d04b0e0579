//! Per-source scraping profiles.
//!
//! A [`SourceProfile`] carries everything the extractor needs to know about
//! one feed's layout: where the page lives, which links are content links,
//! how to synthesize URLs when the data omits them, and which static items
//! to fall back on.
//!
//! | Source | Listing page | Embedded list | Markup links | Automated posts |
//! |--------|--------------|---------------|--------------|-----------------|
//! | Posts | `/blue-tracker` | `entries` | `blue-tracker`, `/news/` | every new item |
//! | News | `/news` | `entries` | `/news/` | priority items only |

use crate::models::SourceKind;
use url::Url;

/// Site all default profiles point at.
pub const DEFAULT_BASE_URL: &str = "https://www.wowhead.com";

/// A fixed evergreen item used by the static fallback tier.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub author: &'static str,
    pub url: &'static str,
    pub preview: &'static str,
}

/// Layout knowledge for one monitored feed.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub kind: SourceKind,
    /// Listing page that is fetched every tick.
    pub url: String,
    /// Origin used to absolutize root-relative links.
    pub base_url: String,
    /// Name of the list field inside the embedded data block.
    pub list_field: &'static str,
    /// Search endpoint; the percent-encoded title is appended.
    pub search_url: String,
    /// Substrings that mark an anchor as a content link.
    pub link_patterns: &'static [&'static str],
    /// Derive item ids from the `/news/<slug>` path of markup links.
    pub ids_from_url: bool,
    /// Image paths under this prefix are trusted without further checks.
    pub upload_path: &'static str,
    /// Vocabulary the text tier uses to recognise headlines.
    pub headline_keywords: &'static [&'static str],
    pub static_entries: &'static [StaticEntry],
    /// Only priority-relevant items are delivered by automated monitors.
    pub priority_only: bool,
}

const POSTS_STATIC: &[StaticEntry] = &[
    StaticEntry {
        id: "static_hotfixes",
        title: "World of Warcraft Hotfixes",
        author: "Blizzard Entertainment",
        url: "https://worldofwarcraft.blizzard.com/en-us/search/blog?k=hotfixes",
        preview: "Running list of hotfixes applied to the live game.",
    },
    StaticEntry {
        id: "static_known_issues",
        title: "Known Issues List",
        author: "Blizzard Entertainment",
        url: "https://us.forums.blizzard.com/en/wow/c/support/known-issues",
        preview: "Issues the development team is aware of and currently investigating.",
    },
];

const NEWS_STATIC: &[StaticEntry] = &[
    StaticEntry {
        id: "mythic_plus_guide",
        title: "Weekly Mythic+ Affixes - Current Rotation Analysis",
        author: "Wowhead Staff",
        url: "https://www.wowhead.com/guides/mythic-plus-dungeons",
        preview: "Analysis of current Mythic+ affixes and optimal strategies for this week's rotation.",
    },
    StaticEntry {
        id: "great_vault_guide",
        title: "Great Vault Rewards Guide - Maximize Your Weekly Loot",
        author: "Wowhead Staff",
        url: "https://www.wowhead.com/guides/great-vault-weekly-chest-the-war-within",
        preview: "Complete guide to maximizing your Great Vault rewards through Mythic+, raids, and PvP activities.",
    },
    StaticEntry {
        id: "season_2_guide",
        title: "The War Within Season 2 - What to Expect",
        author: "Wowhead Staff",
        url: "https://www.wowhead.com/guides/the-war-within-season-2",
        preview: "Preview of upcoming changes and content in The War Within Season 2.",
    },
];

const HEADLINE_KEYWORDS: &[&str] = &[
    "mythic",
    "raid",
    "season",
    "patch",
    "hotfix",
    "class",
    "spec",
    "pvp",
    "dungeon",
];

impl SourceProfile {
    /// Default profile for a source, optionally pointed at another listing URL.
    ///
    /// The base URL is taken from the listing URL's origin, so a mirror or a
    /// local fixture server works without further configuration.
    pub fn for_kind(kind: SourceKind, url_override: Option<&str>) -> Self {
        let url = url_override
            .map(str::to_string)
            .unwrap_or_else(|| match kind {
                SourceKind::Posts => format!("{DEFAULT_BASE_URL}/blue-tracker"),
                SourceKind::News => format!("{DEFAULT_BASE_URL}/news"),
            });
        let base_url = Url::parse(&url)
            .ok()
            .map(|u| u.origin().ascii_serialization())
            .filter(|origin| origin != "null")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        match kind {
            SourceKind::Posts => Self {
                kind,
                search_url: format!("{base_url}/blue-tracker?search="),
                url,
                base_url,
                list_field: "entries",
                link_patterns: &["blue-tracker", "/news/"],
                ids_from_url: false,
                upload_path: "/uploads/",
                headline_keywords: HEADLINE_KEYWORDS,
                static_entries: POSTS_STATIC,
                priority_only: false,
            },
            SourceKind::News => Self {
                kind,
                search_url: format!("{base_url}/search?q="),
                url,
                base_url,
                list_field: "entries",
                link_patterns: &["/news/"],
                ids_from_url: true,
                upload_path: "/uploads/",
                headline_keywords: HEADLINE_KEYWORDS,
                static_entries: NEWS_STATIC,
                priority_only: true,
            },
        }
    }

    /// Absolutize a link found on the page.
    ///
    /// Root-relative and protocol-relative links resolve against the base
    /// URL, other relative links against the listing page.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }
        if let Some(rest) = href.strip_prefix("//") {
            return Some(format!("https://{rest}"));
        }
        if href.starts_with('/') {
            return Some(format!("{}{}", self.base_url, href));
        }
        Url::parse(&self.url)
            .and_then(|base| base.join(href))
            .ok()
            .map(|u| u.to_string())
    }

    /// Search link used when an item has no resolvable URL.
    pub fn search_link(&self, title: &str) -> String {
        let term: String = title.chars().take(50).collect();
        format!("{}{}", self.search_url, urlencoding::encode(&term))
    }

    /// URL synthesized from an entry id.
    ///
    /// Entries flagged as news, and long ids, are news articles; short ones
    /// are forum topics.
    pub fn url_for_id(&self, id: &str, news: bool) -> String {
        if news || id.chars().count() > 6 {
            format!("{}/news/{}", self.base_url, id)
        } else {
            format!("{}/blue-tracker/topic/{}", self.base_url, id)
        }
    }

    /// Identifier taken from a `/news/<slug>` link, query string dropped.
    pub fn id_from_url(&self, url: &str) -> Option<String> {
        let (_, tail) = url.split_once("/news/")?;
        let id = tail.split(['?', '#']).next().unwrap_or("").trim_end_matches('/');
        (!id.is_empty()).then(|| id.to_string())
    }

    /// Whether `href` points back at the listing page rather than an item.
    pub fn is_listing_link(&self, href: &str) -> bool {
        let bare = href.split(['?', '#']).next().unwrap_or("").trim_end_matches('/');
        let listing = self.url.trim_end_matches('/');
        bare.is_empty()
            || bare == listing
            || listing.strip_prefix(&self.base_url) == Some(bare)
    }
}
