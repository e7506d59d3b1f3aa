use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{
    params, params_from_iter,
    types::{Type, Value},
    Connection, OptionalExtension, Row, Transaction,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    collection::Collection,
    merge,
    models::GameType,
    slug::{slugify, SlugAllocator},
    taxonomy,
};

use super::{
    models::{
        CatalogStats, CategoryCount, GamePlayStats, GameQuery, GameRow, ImportSummary, Page,
        SortOrder, MAX_PER_PAGE,
    },
    schema,
};

const GAME_COLUMNS: &str = "g.id, g.slug, g.identity_key, g.source_url, g.title, g.description, \
    g.thumbnail_url, g.embed_url, g.game_type, c.name, c.slug, g.tags, g.features, g.controls, \
    g.total_plays, g.is_new, g.added_at";

const GAME_FROM: &str = "FROM games g JOIN categories c ON c.id = g.category_id";

/// Catalogue database access. Construct once per process and share by reference.
pub struct GameRepository {
    conn: Mutex<Connection>,
}

impl GameRepository {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("failed to configure database")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Import every usable record of `collection`, skipping those already stored.
    ///
    /// Runs in a single transaction: either the whole import lands or none of
    /// it does. Afterwards the newest `new_games` rows are flagged as new.
    pub fn import_collection(
        &self,
        collection: &Collection,
        new_games: usize,
    ) -> Result<ImportSummary> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("failed to start import")?;

        let mut slugs = SlugAllocator::with_taken(existing_slugs(&tx)?);
        let mut summary = ImportSummary::default();
        let now = timestamp(Utc::now());

        for record in collection.games() {
            if merge::validate(record).is_err() {
                summary.rejected += 1;
                continue;
            }
            let Some(key) = record.identity_key() else {
                summary.rejected += 1;
                continue;
            };

            if row_exists(&tx, key.as_str(), record.slug.as_deref())? {
                summary.existing += 1;
                continue;
            }

            let mut record = record.clone();
            taxonomy::enrich(&mut record);

            let slug = match record.slug.as_deref() {
                Some(slug) if slugify(slug).as_deref() == Some(slug) && slugs.reserve(slug) => {
                    slug.to_string()
                }
                _ => slugs.allocate(&record.title),
            };
            let category_id = category_id(&tx, record.category_name(), &now)?;
            let title = if record.title.trim().is_empty() {
                slug.clone()
            } else {
                record.title.trim().to_string()
            };

            tx.execute(
                "INSERT INTO games (identity_key, slug, source_url, title, description, thumbnail_url, \
                 embed_url, game_type, category_id, tags, features, controls, added_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    key.as_str(),
                    slug,
                    record.source_url,
                    title,
                    record.description,
                    record.thumbnail_url,
                    record.playable_embed().unwrap_or_default(),
                    record.game_type.map(GameType::label),
                    category_id,
                    serde_json::to_string(&record.tags)?,
                    serde_json::to_string(&record.features)?,
                    serde_json::to_string(&record.controls)?,
                    timestamp(record.added_at.unwrap_or_else(Utc::now)),
                    now,
                ],
            )
            .with_context(|| format!("failed to insert game {}", record.source_url))?;
            debug!("imported {} as {slug}", record.source_url);
            summary.inserted += 1;
        }

        refresh_new_flags(&tx, new_games)?;
        summary.total = tx
            .query_row("SELECT COUNT(*) FROM games WHERE is_active = 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .context("failed to count games")? as usize;
        tx.commit().context("failed to commit import")?;

        info!(
            inserted = summary.inserted,
            existing = summary.existing,
            rejected = summary.rejected,
            total = summary.total,
            "imported collection"
        );
        Ok(summary)
    }

    /// Filtered, sorted, paginated listing of active games.
    pub fn list(&self, query: &GameQuery) -> Result<Page<GameRow>> {
        let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
        let page = query.page.max(1);

        let mut clauses = vec!["g.is_active = 1".to_string()];
        let mut values: Vec<Value> = Vec::new();

        if let Some(category) = query
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
        {
            values.push(Value::Text(category.to_string()));
            clauses.push(format!("c.slug = ?{}", values.len()));
        }

        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let lowered = search.to_lowercase();
            values.push(Value::Text(format!("%{}%", escape_like(&lowered))));
            let like = values.len();
            values.push(Value::Text(lowered));
            let exact = values.len();
            clauses.push(format!(
                "(LOWER(g.title) LIKE ?{like} ESCAPE '\\' OR LOWER(g.description) LIKE ?{like} ESCAPE '\\' \
                 OR EXISTS (SELECT 1 FROM json_each(g.tags) WHERE LOWER(json_each.value) = ?{exact}))"
            ));
        }

        if query.new_only {
            clauses.push("g.is_new = 1".to_string());
        }

        let filter = clauses.join(" AND ");
        let order = match query.sort {
            SortOrder::Popular => "g.total_plays DESC, g.id ASC",
            SortOrder::Newest => "g.added_at DESC, g.id ASC",
            SortOrder::Name => "g.title COLLATE NOCASE ASC, g.id ASC",
        };

        let conn = self.conn.lock();
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) {GAME_FROM} WHERE {filter}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .context("failed to count games")?;

        let offset = i64::from(page - 1) * i64::from(per_page);
        let sql = format!(
            "SELECT {GAME_COLUMNS} {GAME_FROM} WHERE {filter} ORDER BY {order} LIMIT {per_page} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql).context("failed to prepare listing")?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), row_to_game)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read games")?;

        Ok(Page::new(items, page, per_page, total as u64))
    }

    /// Active game by surrogate id.
    pub fn get_by_id(&self, id: i64) -> Result<Option<GameRow>> {
        self.find_one("g.id = ?1", Value::Integer(id))
    }

    /// Active game by slug.
    pub fn get_by_slug(&self, slug: &str) -> Result<Option<GameRow>> {
        self.find_one("g.slug = ?1", Value::Text(slug.to_string()))
    }

    /// Active game by id, falling back to slug for keys like `2048` that are
    /// both a number and a slug.
    pub fn find(&self, key: &str) -> Result<Option<GameRow>> {
        if let Ok(id) = key.parse::<i64>() {
            if let Some(game) = self.get_by_id(id)? {
                return Ok(Some(game));
            }
        }
        self.get_by_slug(key)
    }

    /// Hide game `id` from listings, lookups and the published site. The row
    /// and its slug are kept, so a re-import does not bring it back.
    ///
    /// Returns `false` when no active game has that id.
    pub fn deactivate(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE games SET is_active = 0, is_new = 0 WHERE id = ?1 AND is_active = 1",
                [id],
            )
            .with_context(|| format!("failed to deactivate game {id}"))?;
        if updated > 0 {
            info!(id, "deactivated game");
        }
        Ok(updated > 0)
    }

    /// Play count and session lengths recorded for active game `id`.
    pub fn game_stats(&self, id: i64) -> Result<Option<GamePlayStats>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(p.id), COALESCE(SUM(p.duration_secs), 0),              COALESCE(AVG(p.duration_secs), 0.0)              FROM games g LEFT JOIN game_plays p ON p.game_id = g.id              WHERE g.id = ?1 AND g.is_active = 1 GROUP BY g.id",
            [id],
            |row| {
                Ok(GamePlayStats {
                    game_id: id,
                    plays: row.get::<_, i64>(0)? as u64,
                    total_duration_secs: row.get::<_, i64>(1)? as u64,
                    average_duration_secs: row.get(2)?,
                })
            },
        )
        .optional()
        .context("failed to read play stats")
    }

    /// Count a play of game `id`. Returns `false` when no such active game exists.
    pub fn record_play(&self, id: i64, duration_secs: u32) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let updated = tx
            .execute(
                "UPDATE games SET total_plays = total_plays + 1 WHERE id = ?1 AND is_active = 1",
                [id],
            )
            .context("failed to count play")?;
        if updated == 0 {
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO game_plays (game_id, duration_secs, played_at) VALUES (?1, ?2, ?3)",
            params![id, duration_secs, timestamp(Utc::now())],
        )
        .context("failed to record play")?;
        tx.commit()?;
        Ok(true)
    }

    /// Categories with their active game counts, in creation order.
    pub fn categories(&self) -> Result<Vec<CategoryCount>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.slug, COUNT(g.id) FROM categories c \
             LEFT JOIN games g ON g.category_id = c.id AND g.is_active = 1 \
             GROUP BY c.id ORDER BY c.id",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(CategoryCount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    games: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read categories")?;
        Ok(categories)
    }

    /// Aggregate numbers plus the five most played games.
    pub fn stats(&self) -> Result<CatalogStats> {
        let (total_games, total_plays, new_games) = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(total_plays), 0), COALESCE(SUM(is_new), 0) \
                 FROM games WHERE is_active = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)? as u64,
                    ))
                },
            )
            .context("failed to compute stats")?
        };

        let popular = self
            .list(&GameQuery {
                per_page: 5,
                ..GameQuery::default()
            })?
            .items;

        Ok(CatalogStats {
            total_games,
            total_plays,
            new_games,
            popular,
        })
    }

    /// Every active game in insertion order.
    pub fn all_games(&self) -> Result<Vec<GameRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GAME_COLUMNS} {GAME_FROM} WHERE g.is_active = 1 ORDER BY g.id"
        ))?;
        let rows = stmt
            .query_map([], row_to_game)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read games")?;
        Ok(rows)
    }

    fn find_one(&self, predicate: &str, value: Value) -> Result<Option<GameRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {GAME_COLUMNS} {GAME_FROM} WHERE {predicate} AND g.is_active = 1"),
            [value],
            row_to_game,
        )
        .optional()
        .context("failed to look up game")
    }
}

fn existing_slugs(tx: &Transaction<'_>) -> Result<Vec<String>> {
    let mut stmt = tx.prepare("SELECT slug FROM games")?;
    let slugs = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("failed to read slugs")?;
    Ok(slugs)
}

fn row_exists(tx: &Transaction<'_>, key: &str, slug: Option<&str>) -> Result<bool> {
    let exists: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM games WHERE identity_key = ?1 OR (?2 IS NOT NULL AND slug = ?2))",
            params![key, slug],
            |row| row.get(0),
        )
        .context("failed to check for existing game")?;
    Ok(exists)
}

fn category_id(tx: &Transaction<'_>, name: &str, now: &str) -> Result<i64> {
    let slug = slugify(name).unwrap_or_else(|| "general".to_string());
    if let Some(id) = tx
        .query_row("SELECT id FROM categories WHERE slug = ?1", [&slug], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
    {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO categories (name, slug, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, slug, format!("Games in the {name} category"), now],
    )
    .with_context(|| format!("failed to create category {name}"))?;
    info!("created category {name}");
    Ok(tx.last_insert_rowid())
}

fn refresh_new_flags(tx: &Transaction<'_>, new_games: usize) -> Result<()> {
    tx.execute("UPDATE games SET is_new = 0", [])?;
    tx.execute(
        "UPDATE games SET is_new = 1 WHERE id IN \
         (SELECT id FROM games WHERE is_active = 1 ORDER BY added_at DESC, id DESC LIMIT ?1)",
        [new_games as i64],
    )
    .context("failed to flag new games")?;
    Ok(())
}

fn row_to_game(row: &Row<'_>) -> rusqlite::Result<GameRow> {
    let game_type: Option<String> = row.get(8)?;
    let added_at: String = row.get(16)?;

    Ok(GameRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        identity_key: row.get(2)?,
        source_url: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        thumbnail_url: row.get(6)?,
        embed_url: row.get(7)?,
        game_type: game_type.as_deref().and_then(GameType::from_label),
        category_name: row.get(9)?,
        category_slug: row.get(10)?,
        tags: json_column(row, 11)?,
        features: json_column(row, 12)?,
        controls: json_column(row, 13)?,
        total_plays: row.get(14)?,
        is_new: row.get(15)?,
        added_at: DateTime::parse_from_rfc3339(&added_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| conversion_failure(16, err))?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|err| conversion_failure(idx, err))
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
