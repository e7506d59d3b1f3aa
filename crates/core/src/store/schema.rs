//! SQLite schema and version tracking.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i32 = 1;

const INITIAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_key TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    source_url TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    thumbnail_url TEXT,
    embed_url TEXT NOT NULL,
    game_type TEXT,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    tags TEXT NOT NULL DEFAULT '[]',
    features TEXT NOT NULL DEFAULT '[]',
    controls TEXT NOT NULL DEFAULT '{}',
    total_plays INTEGER NOT NULL DEFAULT 0,
    is_new INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    added_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_category ON games(category_id);
CREATE INDEX IF NOT EXISTS idx_games_added_at ON games(added_at);

CREATE TABLE IF NOT EXISTS game_plays (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    played_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_game_plays_game ON game_plays(game_id);
"#;

/// Create or validate the schema. Safe to call on every open.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .context("failed to enable foreign keys")?;

    match current_version(conn)? {
        0 => {
            conn.execute_batch(INITIAL_SCHEMA)
                .context("failed to create database schema")?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                [SCHEMA_VERSION],
            )
            .context("failed to record schema version")?;
            info!("initialised database schema v{SCHEMA_VERSION}");
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        other => bail!("database schema v{other} is not supported (expected v{SCHEMA_VERSION})"),
    }
}

fn current_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )
        .context("failed to inspect schema")?;
    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .context("failed to read schema version")?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        initialize(&conn)?;
        initialize(&conn)?;

        let versions: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
        assert_eq!(versions, 1);
        Ok(())
    }

    #[test]
    fn rejects_unknown_version() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        initialize(&conn)?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (99, 'later')",
            [],
        )?;
        assert!(initialize(&conn).is_err());
        Ok(())
    }
}
