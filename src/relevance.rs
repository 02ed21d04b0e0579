//! Relevance classification.
//!
//! Two pure predicates over an item's text:
//!
//! - [`is_relevant`]: worth showing at all. Posts are judged on author and
//!   title, articles on title alone.
//! - [`is_priority_relevant`]: touches the weekly reset cycle or announces
//!   something imminent. Automated news monitoring only delivers these.
//!
//! Matching is lowercase substring search against fixed vocabularies.
//! Nothing here can fail; an item without a title is simply not relevant.

use crate::models::{Item, SourceKind};

/// Authors whose posts skip the include-keyword check.
pub const OFFICIAL_AUTHORS: &[&str] = &[
    "blizzard entertainment",
    "kaivax",
    "linxy",
    "nethaera",
    "blizzard",
    "community manager",
];

/// Post titles that make a non-official post worth showing.
pub const POST_INCLUDE_KEYWORDS: &[&str] = &[
    "hotfix",
    "patch",
    "update",
    "maintenance",
    "downtime",
    "class tuning",
    "dungeon tuning",
    "raid",
    "mythic+",
    "mythic plus",
    "developer",
    "announcement",
    "notes",
    "bug fix",
    "bugfix",
    "weekly",
    "season",
    "expansion",
    "ptr",
    "public test",
    "balance",
    "nerf",
    "buff",
    "adjustment",
    "incoming",
    "development notes",
    "known issues",
    "preview",
];

/// Support and account topics, never shown whoever wrote them.
pub const POST_EXCLUDE_KEYWORDS: &[&str] = &[
    "bug report",
    "suggestions",
    "feedback",
    "ui addon",
    "technical support",
    "customer service",
    "account",
    "billing",
    "refund",
];

/// Other games covered by the same news site.
pub const EXCLUDED_GAMES: &[&str] = &[
    "diablo",
    "overwatch",
    "hearthstone",
    "heroes of the storm",
    "starcraft",
    "call of duty",
    "candy crush",
];

pub const ARTICLE_KEYWORDS: &[&str] = &[
    // general
    "wow",
    "world of warcraft",
    "warcraft",
    "azeroth",
    // expansion and patch cycle
    "war within",
    "midnight",
    "worldsoul saga",
    "patch",
    "hotfix",
    "ptr",
    "public test",
    "alpha",
    "beta",
    // weekly reset content
    "mythic+",
    "mythic plus",
    "m+",
    "affix",
    "affixes",
    "dungeon",
    "great vault",
    "vault",
    "weekly",
    "reset",
    // raids
    "raid",
    "manaforge",
    "dimensius",
    "tier set",
    "tier token",
    "heroic",
    "mythic raid",
    "raid finder",
    "world first",
    // classes
    "class",
    "spec",
    "specialization",
    "talent",
    "hero talent",
    "tuning",
    "nerf",
    "buff",
    "balance",
    "changes",
    // seasonal
    "season",
    "delve",
    "world quest",
    "timewalking",
    "world boss",
    "bonus event",
    "pvp season",
    // professions
    "profession",
    "crafting",
    "knowledge point",
    "catalyst",
    // story
    "sylvanas",
    "thrall",
    "jaina",
    "anduin",
    "xalatath",
    "silvermoon",
    "quel'thalas",
    "void",
    "light",
    // developer content
    "ion hazzikostas",
    "developer",
    "interview",
    "announcement",
    "blizzard",
    "gamescom",
    "blizzcon",
    // new features
    "player housing",
    "housing",
    "devourer",
    "demon hunter",
    "haranir",
    "earthen",
    "race",
    "racial",
];

pub const GENERAL_ARTICLE_KEYWORDS: &[&str] = &["mmo", "rpg", "expansion", "update", "announcement"];

/// Vocabulary of the weekly reset cycle.
pub const RESET_KEYWORDS: &[&str] = &[
    // mythic+
    "mythic+",
    "mythic plus",
    "m+",
    "affix",
    "affixes",
    "dungeon",
    "great vault",
    "vault reward",
    "weekly chest",
    // raids
    "raid",
    "tier set",
    "tier token",
    "raid finder",
    "normal",
    "heroic",
    "mythic raid",
    // weekly events
    "weekly event",
    "timewalking",
    "world boss",
    "world quest",
    "bonus event",
    "arena skirmish",
    "battleground",
    // season boundaries
    "season end",
    "season ending",
    "season start",
    "new season",
    "weekly reset",
    "reset",
    "maintenance",
    "downtime",
    // tuning
    "hotfix",
    "tuning",
    "nerf",
    "buff",
    "balance changes",
    "class changes",
    "spec changes",
    "item level",
    // special events
    "trading post",
    "catalyst",
    "creation catalyst",
    "delve",
    "world soul",
    "bountiful delve",
    // professions
    "profession",
    "crafting",
    "knowledge point",
    // pvp
    "pvp season",
    "rated pvp",
    "arena",
    "conquest",
    "honor",
];

pub const TIMING_KEYWORDS: &[&str] = &[
    "this week",
    "next week",
    "coming week",
    "upcoming",
    "starting",
    "ending",
    "begins",
    "concludes",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "tomorrow",
    "today",
    "soon",
    "incoming",
];

pub const HIGH_PRIORITY_TERMS: &[&str] = &[
    "developer",
    "announcement",
    "upcoming changes",
    "ptr",
    "public test",
    "preview",
    "known issues",
];

fn mentions(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub fn is_official_author(author: &str) -> bool {
    mentions(&author.to_lowercase(), OFFICIAL_AUTHORS)
}

/// Whether `item` is worth showing for `kind`.
///
/// With `official_only`, posts from non-official authors are never relevant.
pub fn is_relevant(item: &Item, kind: SourceKind, official_only: bool) -> bool {
    let title = item.title.trim().to_lowercase();
    if title.is_empty() {
        return false;
    }

    match kind {
        SourceKind::Posts => {
            if mentions(&title, POST_EXCLUDE_KEYWORDS) {
                return false;
            }
            if is_official_author(&item.author) {
                return true;
            }
            !official_only && mentions(&title, POST_INCLUDE_KEYWORDS)
        }
        SourceKind::News => {
            if mentions(&title, EXCLUDED_GAMES) {
                return false;
            }
            mentions(&title, ARTICLE_KEYWORDS) || mentions(&title, GENERAL_ARTICLE_KEYWORDS)
        }
    }
}

/// Whether `item` bears on the weekly reset or announces something imminent.
pub fn is_priority_relevant(item: &Item) -> bool {
    if item.title.trim().is_empty() {
        return false;
    }
    let text = format!("{} {}", item.title, item.preview).to_lowercase();
    mentions(&text, RESET_KEYWORDS)
        || (mentions(&text, TIMING_KEYWORDS) && mentions(&text, HIGH_PRIORITY_TERMS))
}

/// Whether `item` belongs to `target`.
///
/// Items without a region always pass, as does everything when there is no
/// target.
pub fn matches_region(item: &Item, target: Option<&str>) -> bool {
    match (target, item.region.as_deref().map(str::trim)) {
        (Some(target), Some(region)) if !region.is_empty() => region.eq_ignore_ascii_case(target),
        _ => true,
    }
}
