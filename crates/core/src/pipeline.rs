//! End-to-end runs: scrape, merge, persist, import and publish.
//!
//! Each stage is a synchronous single pass. Per-candidate and per-page
//! failures are counted in the [`RunSummary`]; anything that would leave the
//! collection or database half-written aborts the run with an error.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::{
    collection::Collection,
    config::AppConfig,
    merge::{MergeSummary, Merger},
    models::GameRecord,
    scrape::{PageSource, ScrapeCounts, Scraper},
    site::{GenerationReport, SiteGenerator},
    store::{GameRepository, ImportSummary},
};

/// Which stages a run performs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on candidates scraped and merged.
    pub max_games: usize,
    /// Reuse the existing collection without contacting the listing site.
    pub skip_fetch: bool,
    /// Copy the collection file aside before it is rewritten.
    pub backup: bool,
    /// Import the collection into the database and publish from it.
    pub import: bool,
    /// Regenerate the static site.
    pub generate: bool,
}

impl RunOptions {
    /// Every stage enabled, bounded by the configured batch size.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_games: config.max_games,
            skip_fetch: false,
            backup: false,
            import: true,
            generate: true,
        }
    }
}

/// Counts from the site generation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteCounts {
    /// Pages written.
    pub rendered: usize,
    /// Pages skipped.
    pub failed: usize,
    /// Stale pages removed.
    pub pruned: usize,
}

impl From<&GenerationReport> for SiteCounts {
    fn from(report: &GenerationReport) -> Self {
        Self {
            rendered: report.rendered,
            failed: report.failed.len(),
            pruned: report.pruned,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Scrape counts, absent when fetching was skipped.
    pub scrape: Option<ScrapeCounts>,
    /// The listing page could not be retrieved.
    pub listing_failed: bool,
    /// Merge counts.
    pub merge: MergeSummary,
    /// Import counts, absent when the database stage was skipped.
    pub import: Option<ImportSummary>,
    /// Generation counts, absent when generation was skipped.
    pub site: Option<SiteCounts>,
}

impl RunSummary {
    /// Candidates or pages dropped anywhere in the run.
    pub fn failed(&self) -> usize {
        let scrape = self
            .scrape
            .map(|counts| counts.fetch_failures + counts.extract_failures)
            .unwrap_or_default();
        let site = self.site.map(|counts| counts.failed).unwrap_or_default();
        scrape + usize::from(self.listing_failed) + self.merge.rejected + site
    }
}

/// Scrape the listing site and append new games to the collection file.
pub fn scrape<S: PageSource>(
    config: &AppConfig,
    scraper: &Scraper<S>,
    max_games: usize,
    backup: bool,
) -> Result<(Collection, RunSummary)> {
    let mut collection = Collection::load(&config.data_file)?;
    let mut summary = RunSummary::default();

    let report = scraper.scrape(max_games);
    summary.scrape = Some(report.counts());
    summary.listing_failed = report.listing_error.is_some();

    summary.merge = Merger::new(max_games).merge(&mut collection, report.candidates);
    if summary.merge.added > 0 || !config.data_file.exists() {
        if backup {
            Collection::backup(&config.data_file)?;
        }
        if collection.website().is_none() {
            collection.set_website(scraper.base_url().as_str());
        }
        collection.save(&config.data_file)?;
    }
    Ok((collection, summary))
}

/// Import the collection file into the database.
pub fn import(config: &AppConfig, repository: &GameRepository) -> Result<ImportSummary> {
    let collection = Collection::load(&config.data_file)?;
    repository.import_collection(&collection, config.new_games_count)
}

/// Render the site from database rows.
pub fn generate_from_db(
    config: &AppConfig,
    repository: &GameRepository,
) -> Result<GenerationReport> {
    let records: Vec<GameRecord> = repository
        .all_games()?
        .iter()
        .map(|row| row.to_record())
        .collect();
    SiteGenerator::from_config(config).generate(&records)
}

/// Render the site straight from the collection file.
pub fn generate_from_collection(config: &AppConfig) -> Result<GenerationReport> {
    let collection = Collection::load(&config.data_file)?;
    SiteGenerator::from_config(config).generate(collection.games())
}

/// Run every enabled stage in order.
///
/// `scraper` may be `None` only when `options.skip_fetch` is set.
pub fn run<S: PageSource>(
    config: &AppConfig,
    scraper: Option<&Scraper<S>>,
    options: &RunOptions,
) -> Result<RunSummary> {
    let (collection, mut summary) = match scraper.filter(|_| !options.skip_fetch) {
        Some(scraper) => scrape(config, scraper, options.max_games, options.backup)?,
        None => {
            let collection = Collection::load(&config.data_file)?;
            info!("skipping fetch, reusing {} games", collection.len());
            let summary = RunSummary {
                merge: MergeSummary {
                    total: collection.len(),
                    ..MergeSummary::default()
                },
                ..RunSummary::default()
            };
            (collection, summary)
        }
    };

    let records = if options.import {
        let repository = GameRepository::open(&config.database_path)?;
        summary.import =
            Some(repository.import_collection(&collection, config.new_games_count)?);
        repository
            .all_games()?
            .iter()
            .map(|row| row.to_record())
            .collect()
    } else {
        collection.games().to_vec()
    };

    if options.generate {
        let report = SiteGenerator::from_config(config).generate(&records)?;
        summary.site = Some(SiteCounts::from(&report));
    }

    info!(
        added = summary.merge.added,
        skipped = summary.merge.skipped,
        rejected = summary.merge.rejected,
        failed = summary.failed(),
        total = summary.merge.total,
        "run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use super::*;
    use crate::scrape::testing::{detail, listing, FakeSite};
    use tempfile::{tempdir, TempDir};

    const BASE: &str = "https://www.onlinegames.io/";

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            base_url: BASE.to_string(),
            data_file: dir.path().join("games_data.json"),
            database_path: dir.path().join("games.db"),
            output_dir: dir.path().join("site"),
            ..AppConfig::default()
        }
    }

    fn site(slugs: &[&str]) -> FakeSite {
        slugs.iter().fold(
            FakeSite::default().page(BASE, listing(slugs)),
            |site, slug| site.page(&format!("{BASE}{slug}/"), detail(slug)),
        )
    }

    #[test]
    fn full_run_scrapes_imports_and_publishes() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        let scraper = Scraper::new(site(&["alpha", "beta", "gamma"]), BASE, Duration::ZERO)?;

        let summary = run(&config, Some(&scraper), &RunOptions::from_config(&config))?;
        assert_eq!(summary.merge.added, 3);
        assert_eq!(summary.merge.total, 3);
        assert_eq!(summary.import.map(|import| import.inserted), Some(3));
        assert_eq!(summary.site.map(|site| site.rendered), Some(3));
        assert_eq!(summary.failed(), 0);

        assert_eq!(Collection::load(&config.data_file)?.len(), 3);
        assert!(config.output_dir.join("games/game-alpha.html").exists());
        assert!(config.output_dir.join("sitemap.txt").exists());
        Ok(())
    }

    #[test]
    fn rerun_adds_only_new_games() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        let options = RunOptions::from_config(&config);

        let first = Scraper::new(site(&["alpha", "beta"]), BASE, Duration::ZERO)?;
        run(&config, Some(&first), &options)?;

        let second = Scraper::new(site(&["beta", "gamma"]), BASE, Duration::ZERO)?;
        let summary = run(&config, Some(&second), &options)?;
        assert_eq!(summary.merge.added, 1);
        assert_eq!(summary.merge.skipped, 1);
        assert_eq!(summary.merge.total, 3);
        let import = summary.import.expect("import ran");
        assert_eq!((import.inserted, import.existing, import.total), (1, 2, 3));

        let titles: Vec<_> = Collection::load(&config.data_file)?
            .games()
            .iter()
            .map(|game| game.title.clone())
            .collect();
        assert_eq!(titles, vec!["Game alpha", "Game beta", "Game gamma"]);
        Ok(())
    }

    #[test]
    fn unreachable_listing_keeps_existing_data() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        let options = RunOptions {
            import: false,
            ..RunOptions::from_config(&config)
        };
        run(
            &config,
            Some(&Scraper::new(site(&["alpha"]), BASE, Duration::ZERO)?),
            &options,
        )?;
        let before = fs::read_to_string(&config.data_file)?;

        let offline = Scraper::new(FakeSite::default(), BASE, Duration::ZERO)?;
        let summary = run(&config, Some(&offline), &options)?;
        assert!(summary.listing_failed);
        assert_eq!(summary.merge.added, 0);
        assert_eq!(summary.merge.total, 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(fs::read_to_string(&config.data_file)?, before);
        assert_eq!(summary.site.map(|site| site.rendered), Some(1));
        Ok(())
    }

    #[test]
    fn detail_page_without_embed_counts_as_failed() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        let site = FakeSite::default()
            .page(BASE, listing(&["alpha", "noembed"]))
            .page(&format!("{BASE}alpha/"), detail("alpha"))
            .page(
                &format!("{BASE}noembed/"),
                "<html><body><h1>No iframe here</h1></body></html>",
            );
        let scraper = Scraper::new(site, BASE, Duration::ZERO)?;

        let summary = run(&config, Some(&scraper), &RunOptions::from_config(&config))?;
        assert_eq!(summary.merge.added, 1);
        assert_eq!(summary.merge.rejected, 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(Collection::load(&config.data_file)?.len(), 1);
        Ok(())
    }

    #[test]
    fn skip_fetch_publishes_existing_collection() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        let mut record = GameRecord::new("https://www.onlinegames.io/solo/", "Solo");
        record.embed_url = Some("https://cloud.onlinegames.io/solo/".to_string());
        Collection::from_records(vec![record]).save(&config.data_file)?;

        let options = RunOptions {
            skip_fetch: true,
            import: false,
            ..RunOptions::from_config(&config)
        };
        let summary = run::<FakeSite>(&config, None, &options)?;
        assert!(summary.scrape.is_none());
        assert_eq!(summary.merge.total, 1);
        assert!(config.output_dir.join("games/solo.html").exists());
        Ok(())
    }

    #[test]
    fn corrupt_collection_aborts_before_writing() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        fs::write(&config.data_file, "{ not json")?;
        let scraper = Scraper::new(site(&["alpha"]), BASE, Duration::ZERO)?;

        assert!(run(&config, Some(&scraper), &RunOptions::from_config(&config)).is_err());
        assert_eq!(fs::read_to_string(&config.data_file)?, "{ not json");
        assert!(!config.database_path.exists());
        assert!(!config.output_dir.exists());
        Ok(())
    }
}
