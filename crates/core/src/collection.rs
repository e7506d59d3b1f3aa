//! The persisted game collection.
//!
//! The collection file is read in full at the start of a run and rewritten in
//! full at the end. Writes go through a temporary file in the target
//! directory followed by a rename, so readers never observe a torn file.

use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::models::{GameRecord, IdentityKey};

/// Ordered sequence of games persisted between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    website: Option<String>,
    games: Vec<GameRecord>,
}

/// On-disk envelope around the game list.
#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    total_games: usize,
    #[serde(default)]
    games: Vec<GameRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCollection {
    Envelope(CollectionFile),
    Bare(Vec<GameRecord>),
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing list of records.
    pub fn from_records(games: Vec<GameRecord>) -> Self {
        Self {
            website: None,
            games,
        }
    }

    /// Load the collection at `path`, returning an empty one if the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no collection at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read collection {}", path.display()))?;
        let stored: StoredCollection = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse collection {}", path.display()))?;

        let collection = match stored {
            StoredCollection::Envelope(file) => Self {
                website: file.website,
                games: file.games,
            },
            StoredCollection::Bare(games) => Self::from_records(games),
        };

        let duplicates = collection.duplicate_keys();
        if !duplicates.is_empty() {
            warn!(
                "collection {} contains {} duplicate identity keys",
                path.display(),
                duplicates.len()
            );
        }
        Ok(collection)
    }

    /// Atomically replace the file at `path` with this collection.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let file = CollectionFile {
            website: self.website.clone(),
            updated_at: self.latest_added_at(),
            total_games: self.games.len(),
            games: self.games.clone(),
        };
        let serialized =
            serde_json::to_vec_pretty(&file).context("failed to serialize collection")?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
        temp.write_all(&serialized)
            .context("failed to write collection to temporary file")?;
        temp.as_file()
            .sync_all()
            .context("failed to flush collection")?;
        temp.persist(path)
            .with_context(|| format!("failed to replace collection {}", path.display()))?;
        Ok(())
    }

    /// Copy the current file at `path` next to it with a timestamp suffix.
    /// Returns the backup path, or `None` when there was nothing to back up.
    pub fn backup(path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("collection");
        let backup = path.with_file_name(format!(
            "{}_backup_{}.json",
            stem,
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        fs::copy(path, &backup)
            .with_context(|| format!("failed to back up {}", path.display()))?;
        info!("backed up {} to {}", path.display(), backup.display());
        Ok(Some(backup))
    }

    /// Source site the records were harvested from.
    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Record the source site.
    pub fn set_website(&mut self, website: impl Into<String>) {
        self.website = Some(website.into());
    }

    /// Records in insertion order.
    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Identity keys of every record.
    pub fn identity_keys(&self) -> HashSet<IdentityKey> {
        self.games
            .iter()
            .filter_map(GameRecord::identity_key)
            .collect()
    }

    /// Newest `added_at` timestamp across the collection.
    pub fn latest_added_at(&self) -> Option<DateTime<Utc>> {
        self.games.iter().filter_map(|game| game.added_at).max()
    }

    pub(crate) fn push(&mut self, record: GameRecord) {
        self.games.push(record);
    }

    fn duplicate_keys(&self) -> Vec<IdentityKey> {
        let mut seen = HashSet::new();
        self.games
            .iter()
            .filter_map(GameRecord::identity_key)
            .filter(|key| !seen.insert(key.clone()))
            .collect()
    }
}

impl IntoIterator for Collection {
    type Item = GameRecord;
    type IntoIter = std::vec::IntoIter<GameRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.games.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(url: &str, title: &str) -> GameRecord {
        let mut record = GameRecord::new(url, title);
        record.embed_url = Some(format!("{url}/embed"));
        record.added_at = Some(Utc::now());
        record
    }

    #[test]
    fn missing_file_loads_empty() -> Result<()> {
        let dir = tempdir()?;
        let collection = Collection::load(dir.path().join("absent.json"))?;
        assert!(collection.is_empty());
        Ok(())
    }

    #[test]
    fn save_and_reload_preserves_order() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data").join("games.json");

        let mut collection = Collection::new();
        collection.set_website("https://www.onlinegames.io");
        collection.push(record("https://example.org/b", "B"));
        collection.push(record("https://example.org/a", "A"));
        collection.save(&path)?;

        let loaded = Collection::load(&path)?;
        assert_eq!(loaded, collection);
        let titles: Vec<_> = loaded.games().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "temporary files left behind: {leftovers:?}");
        Ok(())
    }

    #[test]
    fn accepts_bare_array() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bare.json");
        fs::write(
            &path,
            r#"[{"source_url": "https://example.org/x", "title": "X", "embed_url": "https://cdn.example.org/x"}]"#,
        )?;
        let loaded = Collection::load(&path)?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.games()[0].title, "X");
        assert!(loaded.website().is_none());
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json")?;
        assert!(Collection::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn backup_copies_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games_data.json");
        assert!(Collection::backup(&path)?.is_none());

        Collection::from_records(vec![record("https://example.org/a", "A")]).save(&path)?;
        let backup = Collection::backup(&path)?.expect("backup path");
        assert!(backup.exists());
        assert_eq!(fs::read(&backup)?, fs::read(&path)?);
        Ok(())
    }
}
