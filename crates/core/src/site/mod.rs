//! Static site generation.
//!
//! Flattens the catalogue into deployable files under the output directory:
//! one page per game, an aggregate listing and a handful of JSON and text
//! indexes. Output depends only on the input records, so regenerating from an
//! unchanged catalogue rewrites byte-identical files.

mod render;

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    config::AppConfig,
    error::RenderError,
    models::GameRecord,
    slug::{slugify, SlugAllocator},
    taxonomy,
};

pub use render::escape;

/// Directory below the output root holding the per-game pages.
pub const GAMES_DIR: &str = "games";

/// A page that could not be produced.
#[derive(Debug)]
pub struct PageFailure {
    /// Slug of the skipped page.
    pub slug: String,
    /// Why it was skipped.
    pub error: RenderError,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Game pages written.
    pub rendered: usize,
    /// Game pages skipped.
    pub failed: Vec<PageFailure>,
    /// Stale game pages removed from earlier runs.
    pub pruned: usize,
}

#[derive(Serialize)]
struct Metadata<'a> {
    total_games: usize,
    generated_at: Option<DateTime<Utc>>,
    website: &'a str,
    site_url: &'a str,
}

#[derive(Serialize)]
struct GameEntry<'a> {
    #[serde(flatten)]
    record: &'a GameRecord,
    category_name: &'a str,
    standardized_tags: &'a [String],
    page_url: String,
}

#[derive(Serialize)]
struct GameIndex<'a> {
    metadata: Metadata<'a>,
    games: Vec<GameEntry<'a>>,
}

#[derive(Serialize)]
struct CategoryEntry {
    name: String,
    slug: String,
    count: usize,
}

struct SitePage {
    record: GameRecord,
    tags: Vec<String>,
}

impl SitePage {
    fn slug(&self) -> &str {
        self.record.slug.as_deref().unwrap_or_default()
    }
}

/// Renders the catalogue into a directory.
#[derive(Debug, Clone)]
pub struct SiteGenerator {
    output_dir: PathBuf,
    site_name: String,
    site_url: String,
    new_games: usize,
    related_games: usize,
}

impl SiteGenerator {
    /// Build a generator writing to `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, site_name: &str, site_url: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            site_name: site_name.to_string(),
            site_url: site_url.trim_end_matches('/').to_string(),
            new_games: 12,
            related_games: 6,
        }
    }

    /// Build a generator from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.output_dir, &config.site_name, &config.site_url)
            .with_new_games(config.new_games_count)
            .with_related_games(config.related_games)
    }

    /// Number of records listed in `new_games.json`.
    pub fn with_new_games(mut self, count: usize) -> Self {
        self.new_games = count;
        self
    }

    /// Maximum number of related games on a detail page.
    pub fn with_related_games(mut self, count: usize) -> Self {
        self.related_games = count;
        self
    }

    /// Root of the generated site.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render every artifact for `records`, in their given order.
    ///
    /// A page that fails to render is skipped and listed in the report;
    /// failing to write one of the shared indexes aborts the run.
    pub fn generate(&self, records: &[GameRecord]) -> Result<GenerationReport> {
        let pages = assign_slugs(records);
        let games_dir = self.output_dir.join(GAMES_DIR);
        fs::create_dir_all(&games_dir)
            .with_context(|| format!("failed to create {}", games_dir.display()))?;

        let layout = render::Layout {
            site_name: &self.site_name,
            site_url: &self.site_url,
        };
        let mut report = GenerationReport::default();
        let mut published = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            match self.render_game(&layout, &pages, index, &games_dir) {
                Ok(()) => {
                    report.rendered += 1;
                    published.push(page);
                }
                Err(error) => {
                    warn!("skipping page {}: {error}", page.slug());
                    report.failed.push(PageFailure {
                        slug: page.slug().to_string(),
                        error,
                    });
                }
            }
        }

        report.pruned = prune_stale_pages(&games_dir, &published)?;

        let listing: Vec<(&str, &GameRecord, &[String])> = published
            .iter()
            .map(|page| (page.slug(), &page.record, page.tags.as_slice()))
            .collect();
        self.write("games.html", render::listing_page(&layout, &listing))?;
        self.write_indexes(&published)?;

        info!(
            rendered = report.rendered,
            failed = report.failed.len(),
            pruned = report.pruned,
            "generated site in {}",
            self.output_dir.display()
        );
        Ok(report)
    }

    fn render_game(
        &self,
        layout: &render::Layout<'_>,
        pages: &[SitePage],
        index: usize,
        games_dir: &Path,
    ) -> Result<(), RenderError> {
        let page = &pages[index];
        let slug = page.slug();
        let embed = page
            .record
            .playable_embed()
            .ok_or_else(|| RenderError::MissingEmbed(slug.to_string()))?;

        let category = page.record.category_name();
        let related: Vec<(&str, &GameRecord)> = pages
            .iter()
            .enumerate()
            .filter(|(other, candidate)| {
                *other != index
                    && candidate.record.category_name() == category
                    && candidate.record.playable_embed().is_some()
            })
            .take(self.related_games)
            .map(|(_, candidate)| (candidate.slug(), &candidate.record))
            .collect();

        let html = render::game_page(layout, &page.record, slug, embed, &page.tags, &related);
        let path = games_dir.join(format!("{slug}.html"));
        fs::write(&path, html).map_err(|source| RenderError::Write {
            path: path.display().to_string(),
            source,
        })?;
        debug!("rendered {}", path.display());
        Ok(())
    }

    fn write_indexes(&self, pages: &[&SitePage]) -> Result<()> {
        let generated_at = pages.iter().filter_map(|page| page.record.added_at).max();
        let all = GameIndex {
            metadata: Metadata {
                total_games: pages.len(),
                generated_at,
                website: &self.site_name,
                site_url: &self.site_url,
            },
            games: pages.iter().map(|page| self.entry(page)).collect(),
        };
        self.write_json("all_games.json", &all)?;

        let newest = GameIndex {
            metadata: Metadata {
                total_games: pages.len().min(self.new_games),
                generated_at,
                website: &self.site_name,
                site_url: &self.site_url,
            },
            games: pages
                .iter()
                .rev()
                .take(self.new_games)
                .map(|page| self.entry(page))
                .collect(),
        };
        self.write_json("new_games.json", &newest)?;

        self.write_json("categories.json", &category_index(pages))?;

        let slugs: String = pages.iter().map(|page| format!("{}\n", page.slug())).collect();
        self.write("game_slugs.txt", slugs)?;

        let mut sitemap = format!("{0}/\n{0}/games.html\n", self.site_url);
        for page in pages {
            sitemap.push_str(&format!("{}/{GAMES_DIR}/{}.html\n", self.site_url, page.slug()));
        }
        self.write("sitemap.txt", sitemap)
    }

    fn entry<'a>(&self, page: &'a SitePage) -> GameEntry<'a> {
        GameEntry {
            record: &page.record,
            category_name: page.record.category_name(),
            standardized_tags: &page.tags,
            page_url: format!("{}/{GAMES_DIR}/{}.html", self.site_url, page.slug()),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let mut json = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialise {name}"))?;
        json.push('\n');
        self.write(name, json)
    }

    fn write(&self, name: &str, contents: String) -> Result<()> {
        let path = self.output_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Give every record a unique slug, keeping valid existing ones.
fn assign_slugs(records: &[GameRecord]) -> Vec<SitePage> {
    let mut allocator = SlugAllocator::new();
    let mut keep = vec![false; records.len()];
    for (index, record) in records.iter().enumerate() {
        if let Some(slug) = record.slug.as_deref() {
            keep[index] = slugify(slug).as_deref() == Some(slug) && allocator.reserve(slug);
        }
    }

    records
        .iter()
        .zip(keep)
        .map(|(record, keep)| {
            let mut record = record.clone();
            if !keep {
                record.slug = Some(allocator.allocate(&record.title));
            }
            taxonomy::enrich(&mut record);
            let tags = taxonomy::standard_tags(&record);
            SitePage { record, tags }
        })
        .collect()
}

fn category_index(pages: &[&SitePage]) -> Vec<CategoryEntry> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut categories: Vec<CategoryEntry> = Vec::new();
    for page in pages {
        let name = page.record.category_name();
        let slug = slugify(name).unwrap_or_else(|| "general".to_string());
        match positions.get(&slug) {
            Some(&position) => categories[position].count += 1,
            None => {
                positions.insert(slug.clone(), categories.len());
                categories.push(CategoryEntry {
                    name: name.to_string(),
                    slug,
                    count: 1,
                });
            }
        }
    }
    categories
}

/// Remove game pages left over from records that are no longer published.
fn prune_stale_pages(games_dir: &Path, published: &[&SitePage]) -> Result<usize> {
    let current: HashSet<&str> = published.iter().map(|page| page.slug()).collect();
    let mut pruned = 0;

    for entry in WalkDir::new(games_dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("failed to list {}", games_dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("html") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !current.contains(stem) {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove stale page {}", path.display()))?;
            debug!("removed stale page {}", path.display());
            pruned += 1;
        }
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn record(n: i64, title: &str, category: &str) -> GameRecord {
        let mut record = GameRecord::new(format!("https://www.onlinegames.io/g{n}/"), title);
        record.description = format!("{title} in your browser.");
        record.embed_url = Some(format!("https://cloud.onlinegames.io/html5/g{n}/"));
        record.category = Some(category.to_string());
        record.added_at = Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::hours(n));
        record
    }

    fn catalogue() -> Vec<GameRecord> {
        vec![
            record(1, "Drift Boss", "Racing"),
            record(2, "Drift Boss", "Racing"),
            record(3, "Stickman Parkour", "Action"),
            record(4, "Traffic Jam", "Racing"),
        ]
    }

    fn read(dir: &Path, name: &str) -> anyhow::Result<String> {
        Ok(fs::read_to_string(dir.join(name))?)
    }

    #[test]
    fn generates_pages_and_indexes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let generator = SiteGenerator::new(dir.path(), "BTW Games", "https://btwgame.com/")
            .with_new_games(2);
        let report = generator.generate(&catalogue())?;
        assert_eq!(report.rendered, 4);
        assert!(report.failed.is_empty());

        assert_eq!(
            read(dir.path(), "game_slugs.txt")?,
            "drift-boss\ndrift-boss-2\nstickman-parkour\ntraffic-jam\n"
        );
        let sitemap = read(dir.path(), "sitemap.txt")?;
        let lines: Vec<_> = sitemap.lines().collect();
        assert_eq!(lines[0], "https://btwgame.com/");
        assert_eq!(lines[1], "https://btwgame.com/games.html");
        assert_eq!(lines[2], "https://btwgame.com/games/drift-boss.html");
        assert_eq!(lines.len(), 6);

        let all: serde_json::Value = serde_json::from_str(&read(dir.path(), "all_games.json")?)?;
        assert_eq!(all["metadata"]["total_games"], 4);
        assert_eq!(all["metadata"]["generated_at"], "2025-03-01T16:00:00Z");
        assert_eq!(all["games"][1]["slug"], "drift-boss-2");
        assert_eq!(all["games"][0]["standardized_tags"][0], "HTML5");

        let newest: serde_json::Value = serde_json::from_str(&read(dir.path(), "new_games.json")?)?;
        let slugs: Vec<_> = newest["games"]
            .as_array()
            .unwrap()
            .iter()
            .map(|game| game["slug"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(slugs, vec!["traffic-jam", "stickman-parkour"]);

        let categories: serde_json::Value =
            serde_json::from_str(&read(dir.path(), "categories.json")?)?;
        assert_eq!(categories[0]["slug"], "racing");
        assert_eq!(categories[0]["count"], 3);
        assert_eq!(categories[1]["slug"], "action");

        let page = read(dir.path(), "games/drift-boss.html")?;
        assert!(page.contains("drift-boss-2.html"));
        assert!(page.contains("traffic-jam.html"));
        assert!(!page.contains("stickman-parkour.html"));
        assert!(read(dir.path(), "games.html")?.contains("games/stickman-parkour.html"));
        Ok(())
    }

    #[test]
    fn regeneration_is_byte_identical() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let generator = SiteGenerator::new(dir.path(), "BTW Games", "https://btwgame.com");

        generator.generate(&catalogue())?;
        let snapshot = |root: &Path| -> anyhow::Result<Vec<(PathBuf, Vec<u8>)>> {
            let mut files = Vec::new();
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push((entry.path().to_path_buf(), fs::read(entry.path())?));
                }
            }
            Ok(files)
        };
        let first = snapshot(dir.path())?;
        generator.generate(&catalogue())?;
        assert_eq!(first, snapshot(dir.path())?);
        Ok(())
    }

    #[test]
    fn broken_record_is_skipped_and_reported() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut records = catalogue();
        records[2].embed_url = Some("javascript:alert(1)".to_string());

        let report = SiteGenerator::new(dir.path(), "BTW Games", "https://btwgame.com")
            .generate(&records)?;
        assert_eq!(report.rendered, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].slug, "stickman-parkour");
        assert!(matches!(report.failed[0].error, RenderError::MissingEmbed(_)));
        assert!(!dir.path().join("games/stickman-parkour.html").exists());
        assert!(!read(dir.path(), "game_slugs.txt")?.contains("stickman"));
        Ok(())
    }

    #[test]
    fn existing_slugs_are_kept_and_stale_pages_pruned() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let generator = SiteGenerator::new(dir.path(), "BTW Games", "https://btwgame.com");
        let mut records = catalogue();
        records[1].slug = Some("drift-boss".to_string());
        generator.generate(&records)?;
        assert_eq!(
            read(dir.path(), "game_slugs.txt")?,
            "drift-boss-2\ndrift-boss\nstickman-parkour\ntraffic-jam\n"
        );

        let report = generator.generate(&records[1..])?;
        assert_eq!(report.pruned, 1);
        assert!(!dir.path().join("games/drift-boss-2.html").exists());
        Ok(())
    }
}
