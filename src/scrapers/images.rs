//! Image URL normalization and filtering.
//!
//! Pages are full of images that are not content: avatars, icons, share
//! buttons, logos. Every candidate image goes through [`normalize_image_url`]
//! and then [`is_valid_post_image`] before it is attached to an item.

use crate::sources::SourceProfile;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

const SKIP_PATTERNS: &[&str] = &[
    "avatar",
    "icon-small",
    "emoji",
    "smiley",
    "button",
    "nav",
    "menu",
    "logo-small",
    "signature",
    "share-icon",
    "facebook",
    "twitter",
    "social",
    "logo.png",
    "favicon",
    "generic",
    "placeholder",
];

const TRUSTED_DOMAINS: &[&str] = &["blizzard.com", "battle.net", "wowhead.com", "wow.zamimg.com"];

const CONTENT_PATTERNS: &[&str] = &[
    "screenshot",
    "image",
    "content",
    "post",
    "news",
    "announcement",
    "banner",
    "header",
];

static RE_IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).unwrap());
static RE_BARE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"]+\.(?:jpg|jpeg|png|gif|webp)(?:\?[^\s<>"]*)?"#).unwrap()
});

static BANNER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "img.news-banner",
        "img.article-banner",
        ".news-header img",
        ".article-header img",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static META_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [r#"meta[property="og:image"]"#, r#"meta[name="twitter:image"]"#]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static CONTENT_IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.news-content img, div.article-content img, div.content img").unwrap()
});

/// Make an image URL absolute.
///
/// - `//host/x.png` becomes `https://host/x.png`
/// - `/x.png` is joined onto the profile's base URL
/// - any other relative path is joined onto the base URL with a `/`
pub fn normalize_image_url(url: &str, profile: &SourceProfile) -> String {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if url.starts_with('/') {
        format!("{}{}", profile.base_url, url)
    } else if !url.starts_with("http") {
        format!("{}/{}", profile.base_url, url)
    } else {
        url.to_string()
    }
}

/// Heuristic check that an image is post content rather than page chrome.
///
/// Known chrome patterns are rejected first. Images under the profile's
/// upload path are then accepted outright; anything else must come from a
/// trusted domain, look like content, and be a reasonably long URL.
pub fn is_valid_post_image(src: &str, profile: &SourceProfile) -> bool {
    if src.len() < 10 {
        return false;
    }
    let lower = src.to_lowercase();
    if SKIP_PATTERNS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if !profile.upload_path.is_empty() && lower.contains(profile.upload_path) {
        return true;
    }
    TRUSTED_DOMAINS.iter().any(|d| lower.contains(d))
        && CONTENT_PATTERNS.iter().any(|p| lower.contains(p))
        && src.len() > 30
}

/// Normalize then validate in one step.
pub fn accept_image(src: &str, profile: &SourceProfile) -> Option<String> {
    let normalized = normalize_image_url(src, profile);
    is_valid_post_image(&normalized, profile).then_some(normalized)
}

/// Find the first usable image inside a post body.
///
/// `<img src>` tags are tried first, then bare image URLs in the text.
pub fn image_from_content(content: &str, profile: &SourceProfile) -> Option<String> {
    RE_IMG_TAG
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .find_map(|m| accept_image(m.as_str(), profile))
        .or_else(|| {
            RE_BARE_IMAGE
                .find_iter(content)
                .find_map(|m| accept_image(m.as_str(), profile))
        })
}

/// Pick the banner image off a fetched article page.
///
/// Tries dedicated banner elements, then the Open Graph / Twitter card
/// metadata, then any valid image inside the article body.
pub fn banner_from_page(document: &Html, profile: &SourceProfile) -> Option<String> {
    let from_banner = BANNER_SELECTORS.iter().find_map(|sel| {
        document
            .select(sel)
            .filter_map(|el| el.value().attr("src"))
            .find_map(|src| accept_image(src, profile))
    });
    if from_banner.is_some() {
        return from_banner;
    }

    let from_meta = META_SELECTORS.iter().find_map(|sel| {
        document
            .select(sel)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|src| accept_image(src, profile))
    });
    if from_meta.is_some() {
        return from_meta;
    }

    document
        .select(&CONTENT_IMG_SELECTOR)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| accept_image(src, profile))
}
