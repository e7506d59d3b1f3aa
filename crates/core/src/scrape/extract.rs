//! Markup extraction for listing and detail pages.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::{
    error::ExtractError,
    models::{GameRecord, GameType},
};

const MAX_DESCRIPTION_CHARS: usize = 500;
const MIN_DESCRIPTION_CHARS: usize = 20;
const MAX_TAGS: usize = 5;
const MAX_TAG_CHARS: usize = 50;

const SKIPPED_LINK_PATTERNS: &[&str] = &["tag", "category", "about", "contact", "privacy", "terms"];
const GAME_LINK_HINTS: &[&str] = &["game", "play", "online"];
const NON_GAME_TITLES: &[&str] = &["home", "about", "contact", "privacy"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".bmp"];
const IMAGE_KEYWORDS: &[&str] = &[
    "image",
    "img",
    "photo",
    "picture",
    "thumbnail",
    "preview",
    "screenshot",
];
const NON_IMAGE_KEYWORDS: &[&str] = &["icon", "logo", "avatar", "favicon", "button", "arrow"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".game-description",
    ".description",
    ".game-info",
    ".intro",
    "p",
];
const TAG_SELECTORS: &[&str] = &[".tags a", ".tag", ".category", ".game-tags a"];
const CATEGORY_SELECTORS: &[&str] = &[
    ".breadcrumb a:last-child",
    ".category-name",
    ".game-category",
];
const THUMBNAIL_META_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
];
const THUMBNAIL_IMG_SELECTORS: &[&str] = &[
    ".game-thumbnail img",
    ".thumbnail img",
    ".game-image img",
    ".preview img",
    ".screenshot img",
    r#"img[alt*="thumbnail"]"#,
    r#"img[alt*="preview"]"#,
    r#"img[alt*="screenshot"]"#,
    ".game-container img",
    "img",
];

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));
static DIV_SEL: Lazy<Selector> = Lazy::new(|| selector("div"));
static SECTION_SEL: Lazy<Selector> = Lazy::new(|| selector("section"));
static LINK_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IMG_SEL: Lazy<Selector> = Lazy::new(|| selector("img"));
static IFRAME_SEL: Lazy<Selector> = Lazy::new(|| selector("iframe[src]"));
static META_DESCRIPTION_SEL: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[name="description"]"#));
static META_KEYWORDS_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="keywords"]"#));
static BODY_SEL: Lazy<Selector> = Lazy::new(|| selector("body"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid selector {css}: {err:?}"))
}

/// A game page discovered on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLink {
    /// Link text.
    pub title: String,
    /// Absolute URL of the detail page.
    pub url: String,
    /// Preview image next to the link, if any.
    pub thumbnail: Option<String>,
}

/// Collect game links from the "recently played" block of a listing page.
///
/// Returns an empty list when the block cannot be located. Links are
/// deduplicated by URL, keeping the first.
pub fn extract_game_links(html: &str, base: &Url) -> Vec<GameLink> {
    let document = Html::parse_document(html);
    let Some(section) = find_recent_section(&document) else {
        return Vec::new();
    };

    let mut links: Vec<GameLink> = Vec::new();
    for link in section.select(&LINK_SEL) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = element_text(&link);
        if title.chars().count() <= 2 || !is_game_link(href, &title) {
            continue;
        }
        let Some(url) = absolutize(base, href) else {
            continue;
        };
        if links.iter().any(|existing| existing.url == url) {
            continue;
        }

        links.push(GameLink {
            title,
            url,
            thumbnail: link_thumbnail(&link, base),
        });
    }
    links
}

/// Build a candidate record from a game detail page.
///
/// Fields the page does not provide are left empty; only a document without
/// any body content is treated as a failure.
pub fn extract_game(html: &str, link: &GameLink, base: &Url) -> Result<GameRecord, ExtractError> {
    let document = Html::parse_document(html);
    let has_content = document
        .select(&BODY_SEL)
        .next()
        .map(|body| body.children().next().is_some())
        .unwrap_or(false);
    if !has_content {
        return Err(ExtractError::Unparseable(format!(
            "empty document at {}",
            link.url
        )));
    }

    let mut record = GameRecord::new(&link.url, link.title.trim());
    record.embed_url = document
        .select(&IFRAME_SEL)
        .filter_map(|iframe| iframe.value().attr("src"))
        .find_map(|src| absolutize(base, src));
    record.game_type = record
        .embed_url
        .as_deref()
        .map(GameType::from_embed_url);
    record.description = extract_description(&document);
    record.tags = extract_tags(&document);
    record.category = first_text(&document, CATEGORY_SELECTORS);
    record.thumbnail_url = extract_thumbnail(&document, base).or_else(|| link.thumbnail.clone());
    Ok(record)
}

/// Whether `href`/`title` look like a link to a game page.
pub fn is_game_link(href: &str, title: &str) -> bool {
    let href = href.to_lowercase();
    if SKIPPED_LINK_PATTERNS
        .iter()
        .any(|pattern| href.contains(pattern))
    {
        return false;
    }
    if GAME_LINK_HINTS.iter().any(|hint| href.contains(hint)) {
        return true;
    }

    let title = title.to_lowercase();
    title.chars().count() > 3 && !NON_GAME_TITLES.iter().any(|skip| title.contains(skip))
}

/// Whether `url` plausibly points at a content image rather than chrome.
pub fn is_valid_image_url(url: &str) -> bool {
    if url.len() < 10 || url.starts_with("data:") || url.starts_with("blob:") {
        return false;
    }
    let lower = url.to_lowercase();
    let looks_like_image = IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        || IMAGE_KEYWORDS.iter().any(|keyword| lower.contains(keyword));
    looks_like_image && !NON_IMAGE_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Resolve `href` against `base`; protocol-relative links become https.
pub fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    base.join(href).ok().map(String::from)
}

fn find_recent_section(document: &Html) -> Option<ElementRef<'_>> {
    let has_classes = |element: &ElementRef<'_>, required: &[&str]| {
        element
            .value()
            .attr("class")
            .map(|class| required.iter().all(|needle| class.contains(needle)))
            .unwrap_or(false)
    };

    document
        .select(&DIV_SEL)
        .find(|div| has_classes(div, &["section", "recently"]))
        .or_else(|| {
            document
                .select(&SECTION_SEL)
                .find(|section| has_classes(section, &["recently"]))
        })
}

fn link_thumbnail(link: &ElementRef<'_>, base: &Url) -> Option<String> {
    if let Some(src) = valid_img_src(link, base) {
        return Some(src);
    }

    link.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| ancestor.value().name() != "body")
        .find_map(|ancestor| valid_img_src(&ancestor, base))
}

fn valid_img_src(scope: &ElementRef<'_>, base: &Url) -> Option<String> {
    let src = scope.select(&IMG_SEL).next()?.value().attr("src")?;
    if is_valid_image_url(src) {
        absolutize(base, src)
    } else {
        None
    }
}

fn extract_description(document: &Html) -> String {
    let meta = document
        .select(&META_DESCRIPTION_SEL)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(collapse_whitespace);

    let candidates = meta.into_iter().chain(DESCRIPTION_SELECTORS.iter().filter_map(|css| {
        document
            .select(&selector(css))
            .next()
            .map(|element| element_text(&element))
    }));

    for text in candidates {
        if text.chars().count() > MIN_DESCRIPTION_CHARS {
            return text.chars().take(MAX_DESCRIPTION_CHARS).collect();
        }
    }
    String::new()
}

fn extract_tags(document: &Html) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    for css in TAG_SELECTORS {
        for element in document.select(&selector(css)) {
            let text = element_text(&element);
            if text.chars().count() < MAX_TAG_CHARS {
                push(text);
            }
        }
    }

    if let Some(keywords) = document
        .select(&META_KEYWORDS_SEL)
        .next()
        .and_then(|meta| meta.value().attr("content"))
    {
        for keyword in keywords.split(',').take(MAX_TAGS) {
            push(keyword.trim().to_string());
        }
    }

    tags.truncate(MAX_TAGS);
    tags
}

fn extract_thumbnail(document: &Html, base: &Url) -> Option<String> {
    for css in THUMBNAIL_META_SELECTORS {
        if let Some(content) = document
            .select(&selector(css))
            .next()
            .and_then(|meta| meta.value().attr("content"))
        {
            if is_valid_image_url(content) {
                return absolutize(base, content);
            }
        }
    }

    for css in THUMBNAIL_IMG_SELECTORS {
        if let Some(src) = document
            .select(&selector(css))
            .next()
            .and_then(|img| img.value().attr("src"))
        {
            if is_valid_image_url(src) {
                return absolutize(base, src);
            }
        }
    }
    None
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        document
            .select(&selector(css))
            .next()
            .map(|element| element_text(&element))
            .filter(|text| !text.is_empty())
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}
