//! Shared domain models.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Runtime technology of an embedded game, derived from its iframe URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    /// Unity WebGL build.
    Unity,
    /// Legacy Flash emulation.
    Flash,
    /// Explicit HTML5 build.
    #[serde(rename = "HTML5")]
    Html5,
    /// Any other browser game.
    Web,
}

impl GameType {
    /// Classify an embed URL by the runtime hints it carries.
    pub fn from_embed_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("unity") {
            GameType::Unity
        } else if lower.contains("flash") {
            GameType::Flash
        } else if lower.contains("html5") {
            GameType::Html5
        } else {
            GameType::Web
        }
    }

    /// Parse a label written by [`GameType::label`], ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        [GameType::Unity, GameType::Flash, GameType::Html5, GameType::Web]
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }

    /// Label used in tags and generated pages.
    pub fn label(self) -> &'static str {
        match self {
            GameType::Unity => "Unity",
            GameType::Flash => "Flash",
            GameType::Html5 => "HTML5",
            GameType::Web => "Web",
        }
    }
}

/// Deduplication key of a [`GameRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Build a key from a source URL: scheme and host lowercased, fragment and
    /// trailing slashes dropped. Returns `None` for blank input.
    pub fn from_url(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return None;
        }

        let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
        let normalized = match without_fragment.split_once("://") {
            Some((scheme, rest)) => {
                let (authority, path) = match rest.find(|c: char| c == '/' || c == '?') {
                    Some(idx) => rest.split_at(idx),
                    None => (rest, ""),
                };
                format!(
                    "{}://{}{}",
                    scheme.to_lowercase(),
                    authority.to_lowercase(),
                    path
                )
            }
            None => without_fragment.to_string(),
        };

        let normalized = normalized.trim_end_matches('/').to_string();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Key used for records that were catalogued by slug only.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim();
        if slug.is_empty() {
            None
        } else {
            Some(Self(format!("slug:{slug}")))
        }
    }

    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scraped or catalogued game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Canonical page URL on the listing site.
    #[serde(default, alias = "url")]
    pub source_url: String,
    /// URL-safe identifier, assigned on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Short description; empty when extraction found none.
    #[serde(default)]
    pub description: String,
    /// Preview image.
    #[serde(
        default,
        alias = "thumbnail",
        deserialize_with = "non_blank",
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail_url: Option<String>,
    /// Playable iframe target.
    #[serde(
        default,
        alias = "iframe_url",
        alias = "game_url",
        deserialize_with = "non_blank",
        skip_serializing_if = "Option::is_none"
    )]
    pub embed_url: Option<String>,
    /// Category label as published by the source site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Runtime technology of the embed.
    #[serde(
        default,
        deserialize_with = "lenient_game_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub game_type: Option<GameType>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Selling points shown on the detail page.
    #[serde(default)]
    pub features: Vec<String>,
    /// Input binding → description.
    #[serde(default)]
    pub controls: BTreeMap<String, String>,
    /// When the record first entered the collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl GameRecord {
    /// Create a bare candidate for a source page.
    pub fn new(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            slug: None,
            title: title.into(),
            description: String::new(),
            thumbnail_url: None,
            embed_url: None,
            category: None,
            game_type: None,
            tags: Vec::new(),
            features: Vec::new(),
            controls: BTreeMap::new(),
            added_at: None,
        }
    }

    /// Deduplication key: the normalised source URL, else the slug.
    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::from_url(&self.source_url)
            .or_else(|| self.slug.as_deref().and_then(IdentityKey::from_slug))
    }

    /// Embed URL when it is present and points at an http(s) resource.
    pub fn playable_embed(&self) -> Option<&str> {
        self.embed_url
            .as_deref()
            .map(str::trim)
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
    }

    /// Category label with the catalogue default applied.
    pub fn category_name(&self) -> &str {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

/// Unknown or blank labels read as "not yet classified".
fn lenient_game_type<'de, D>(deserializer: D) -> Result<Option<GameType>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.as_deref().and_then(GameType::from_label))
}

/// Category assigned to records without one.
pub const DEFAULT_CATEGORY: &str = "General";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_normalizes_host_and_trailing_slash() {
        let a = IdentityKey::from_url("HTTPS://www.OnlineGames.io/Drift-Boss/#play").unwrap();
        let b = IdentityKey::from_url("https://www.onlinegames.io/Drift-Boss").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://www.onlinegames.io/Drift-Boss");
    }

    #[test]
    fn identity_key_falls_back_to_slug() {
        let mut record = GameRecord::new("", "Drift Boss");
        assert!(record.identity_key().is_none());
        record.slug = Some("drift-boss".to_string());
        assert_eq!(record.identity_key().unwrap().as_str(), "slug:drift-boss");
    }

    #[test]
    fn playable_embed_requires_http() {
        let mut record = GameRecord::new("https://example.org/a", "A");
        record.embed_url = Some("  ".to_string());
        assert!(record.playable_embed().is_none());
        record.embed_url = Some("javascript:void(0)".to_string());
        assert!(record.playable_embed().is_none());
        record.embed_url = Some(" https://cdn.example.org/a/index.html ".to_string());
        assert_eq!(
            record.playable_embed(),
            Some("https://cdn.example.org/a/index.html")
        );
    }

    #[test]
    fn game_type_classification() {
        assert_eq!(
            GameType::from_embed_url("https://x/unity/build"),
            GameType::Unity
        );
        assert_eq!(GameType::from_embed_url("https://x/html5/g"), GameType::Html5);
        assert_eq!(GameType::from_embed_url("https://x/g"), GameType::Web);
        assert_eq!(GameType::from_label("html5"), Some(GameType::Html5));
        assert_eq!(GameType::from_label(""), None);
    }

    #[test]
    fn legacy_record_keys_are_accepted() -> serde_json::Result<()> {
        let record: GameRecord = serde_json::from_str(
            r#"{
                "title": "Drift Boss",
                "url": "https://www.onlinegames.io/drift-boss/",
                "iframe_url": "https://cloud.onlinegames.io/drift-boss/index.html",
                "thumbnail": "https://cdn.onlinegames.io/drift-boss.jpg",
                "game_type": "",
                "category": "",
                "rating": "4.5"
            }"#,
        )?;
        assert_eq!(record.source_url, "https://www.onlinegames.io/drift-boss/");
        assert!(record.playable_embed().is_some());
        assert!(record.thumbnail_url.is_some());
        assert_eq!(record.game_type, None);

        let blank: GameRecord = serde_json::from_str(r#"{"title": "X", "thumbnail": ""}"#)?;
        assert!(blank.thumbnail_url.is_none());

        let typed: GameRecord = serde_json::from_str(r#"{"title": "X", "game_type": "HTML5"}"#)?;
        assert_eq!(typed.game_type, Some(GameType::Html5));
        Ok(())
    }
}
