use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{GameRecord, GameType};

/// A game as stored in the catalogue database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRow {
    /// Row id.
    pub id: i64,
    /// Unique URL slug.
    pub slug: String,
    /// Deduplication key the row was imported under.
    pub identity_key: String,
    /// Detail page the game was scraped from.
    pub source_url: String,
    /// Display title.
    pub title: String,
    /// Description, possibly empty.
    pub description: String,
    /// Thumbnail image, if one was found.
    pub thumbnail_url: Option<String>,
    /// URL loaded in the player iframe.
    pub embed_url: String,
    /// Engine inferred from the embed URL.
    pub game_type: Option<GameType>,
    /// Category display name.
    pub category_name: String,
    /// Category slug.
    pub category_slug: String,
    /// Descriptive and standard tags.
    pub tags: Vec<String>,
    /// Feature labels.
    pub features: Vec<String>,
    /// Key to action map.
    pub controls: BTreeMap<String, String>,
    /// Recorded plays.
    pub total_plays: i64,
    /// Among the most recently added games.
    pub is_new: bool,
    /// When the game first entered the collection.
    pub added_at: DateTime<Utc>,
}

impl GameRow {
    /// Convert back into a collection record carrying the assigned slug.
    pub fn to_record(&self) -> GameRecord {
        GameRecord {
            source_url: self.source_url.clone(),
            slug: Some(self.slug.clone()),
            title: self.title.clone(),
            description: self.description.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            embed_url: Some(self.embed_url.clone()),
            category: Some(self.category_name.clone()),
            game_type: self.game_type,
            tags: self.tags.clone(),
            features: self.features.clone(),
            controls: self.controls.clone(),
            added_at: Some(self.added_at),
        }
    }
}

/// Ordering applied to listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most played first.
    #[default]
    Popular,
    /// Most recently added first.
    Newest,
    /// Alphabetical by title.
    Name,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "popular" => Ok(SortOrder::Popular),
            "newest" => Ok(SortOrder::Newest),
            "name" => Ok(SortOrder::Name),
            other => Err(format!("unknown sort order `{other}` (popular, newest, name)")),
        }
    }
}

/// Listing filters and pagination.
#[derive(Debug, Clone)]
pub struct GameQuery {
    /// Category slug; `all` or `None` disables the filter.
    pub category: Option<String>,
    /// Case-insensitive text match on title/description, or exact tag.
    pub search: Option<String>,
    /// Only games currently flagged as new.
    pub new_only: bool,
    /// Result ordering.
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: u32,
    /// Page size, clamped to [`MAX_PER_PAGE`].
    pub per_page: u32,
}

impl Default for GameQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            new_only: false,
            sort: SortOrder::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Page size used when none is requested.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest accepted page size.
pub const MAX_PER_PAGE: u32 = 100;

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Effective page size.
    pub per_page: u32,
    /// Rows matching the query across all pages.
    pub total: u64,
    /// Number of pages.
    pub pages: u64,
    /// A later page exists.
    pub has_next: bool,
    /// An earlier page exists.
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let pages = total.div_ceil(u64::from(per_page));
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_next: u64::from(page) < pages,
            has_prev: page > 1,
        }
    }
}

/// A category with its number of active games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Active games in the category.
    pub games: u64,
}

/// Aggregate catalogue numbers.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    /// Active games.
    pub total_games: u64,
    /// Plays across all active games.
    pub total_plays: i64,
    /// Active games flagged as new.
    pub new_games: u64,
    /// Most played games, at most five.
    pub popular: Vec<GameRow>,
}

/// Play history of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GamePlayStats {
    /// Game the plays belong to.
    pub game_id: i64,
    /// Recorded play sessions.
    pub plays: u64,
    /// Sum of session lengths in seconds.
    pub total_duration_secs: u64,
    /// Mean session length in seconds, zero without plays.
    pub average_duration_secs: f64,
}

/// Result of importing a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Rows created.
    pub inserted: usize,
    /// Records that already had a row.
    pub existing: usize,
    /// Records without a usable embed URL.
    pub rejected: usize,
    /// Active rows after the import.
    pub total: usize,
}
