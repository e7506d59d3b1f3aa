//! Harvesting game candidates from the listing site.

/// Markup extraction for listing and detail pages.
pub mod extract;
/// HTTP retrieval.
pub mod fetch;

use std::{thread, time::Duration};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::{CandidateError, FetchError},
    models::GameRecord,
};

pub use extract::{extract_game, extract_game_links, GameLink};
pub use fetch::{HttpFetcher, PageSource};

/// A candidate that was dropped before merging.
#[derive(Debug)]
pub struct ScrapeFailure {
    /// Page that failed.
    pub url: String,
    /// Why it was dropped.
    pub error: CandidateError,
}

/// Outcome of one scrape pass.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Links found on the listing page before truncation.
    pub links_found: usize,
    /// Extracted candidates in fetch order.
    pub candidates: Vec<GameRecord>,
    /// Dropped candidates.
    pub failures: Vec<ScrapeFailure>,
    /// Set when the listing page itself could not be retrieved.
    pub listing_error: Option<FetchError>,
}

/// Counts derived from a [`ScrapeReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeCounts {
    /// Candidates produced.
    pub candidates: usize,
    /// Detail pages that could not be fetched.
    pub fetch_failures: usize,
    /// Detail pages that could not be parsed.
    pub extract_failures: usize,
}

impl ScrapeReport {
    /// Summarise the report.
    pub fn counts(&self) -> ScrapeCounts {
        let fetch_failures = self
            .failures
            .iter()
            .filter(|failure| matches!(failure.error, CandidateError::Fetch(_)))
            .count();
        ScrapeCounts {
            candidates: self.candidates.len(),
            fetch_failures,
            extract_failures: self.failures.len() - fetch_failures,
        }
    }
}

/// Walks the listing page and every linked detail page.
pub struct Scraper<S> {
    source: S,
    base_url: Url,
    delay: Duration,
}

impl Scraper<HttpFetcher> {
    /// Build an HTTP-backed scraper from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout())?;
        Self::new(fetcher, &config.base_url, config.request_delay())
    }
}

impl<S: PageSource> Scraper<S> {
    /// Create a scraper over `source` rooted at `base_url`.
    pub fn new(source: S, base_url: &str, delay: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
        Ok(Self {
            source,
            base_url,
            delay,
        })
    }

    /// Listing page URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Scrape at most `max_games` detail pages.
    pub fn scrape(&self, max_games: usize) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        let listing = match self.source.fetch(self.base_url.as_str()) {
            Ok(listing) => listing,
            Err(err) => {
                warn!("listing page unavailable: {err}");
                report.listing_error = Some(err);
                return report;
            }
        };

        let mut links = extract_game_links(&listing, &self.base_url);
        report.links_found = links.len();
        if links.is_empty() {
            warn!("no game links found on {}", self.base_url);
            return report;
        }
        links.truncate(max_games);
        info!(
            "scraping {} of {} games from {}",
            links.len(),
            report.links_found,
            self.base_url
        );

        let total = links.len();
        for (index, link) in links.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }

            match self.scrape_one(link) {
                Ok(record) => {
                    info!(
                        "[{}/{}] {} (embed: {}, thumbnail: {})",
                        index + 1,
                        total,
                        record.title,
                        record.embed_url.is_some(),
                        record.thumbnail_url.is_some()
                    );
                    report.candidates.push(record);
                }
                Err(error) => {
                    warn!("[{}/{}] dropping {}: {error}", index + 1, total, link.url);
                    report.failures.push(ScrapeFailure {
                        url: link.url.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    fn scrape_one(&self, link: &GameLink) -> Result<GameRecord, CandidateError> {
        let page = self.source.fetch(&link.url)?;
        Ok(extract_game(&page, link, &self.base_url)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// In-memory page source keyed by URL.
    #[derive(Default)]
    pub(crate) struct FakeSite {
        pages: HashMap<String, String>,
        statuses: HashMap<String, u16>,
    }

    impl FakeSite {
        pub(crate) fn page(mut self, url: &str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub(crate) fn status(mut self, url: &str, status: u16) -> Self {
            self.statuses.insert(url.to_string(), status);
            self
        }
    }

    impl PageSource for FakeSite {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if let Some(status) = self.statuses.get(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Timeout {
                url: url.to_string(),
            })
        }
    }

    pub(crate) fn listing(slugs: &[&str]) -> String {
        let links: String = slugs
            .iter()
            .map(|slug| format!(r#"<a href="/{slug}/">Game {slug}</a>"#))
            .collect();
        format!(r#"<html><body><div class="section recently">{links}</div></body></html>"#)
    }

    pub(crate) fn detail(slug: &str) -> String {
        format!(
            r#"<html><head><meta name="description" content="{slug} is a great browser game to play online."></head>
<body><iframe src="https://cloud.onlinegames.io/{slug}/index.html"></iframe></body></html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const BASE: &str = "https://www.onlinegames.io/";

    #[test]
    fn scrapes_all_linked_pages() -> Result<()> {
        let site = FakeSite::default()
            .page(BASE, listing(&["alpha", "beta"]))
            .page("https://www.onlinegames.io/alpha/", detail("alpha"))
            .page("https://www.onlinegames.io/beta/", detail("beta"));
        let scraper = Scraper::new(site, BASE, Duration::ZERO)?;

        let report = scraper.scrape(100);
        assert_eq!(report.links_found, 2);
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.candidates[0].title, "Game alpha");
        assert!(report.failures.is_empty());
        Ok(())
    }

    #[test]
    fn failures_are_tallied_not_fatal() -> Result<()> {
        let site = FakeSite::default()
            .page(BASE, listing(&["alpha", "beta", "gamma", "delta"]))
            .page("https://www.onlinegames.io/alpha/", detail("alpha"))
            .status("https://www.onlinegames.io/beta/", 404)
            .page("https://www.onlinegames.io/delta/", "");
        let scraper = Scraper::new(site, BASE, Duration::ZERO)?;

        let report = scraper.scrape(100);
        let counts = report.counts();
        assert_eq!(counts.candidates, 1);
        assert_eq!(counts.fetch_failures, 2);
        assert_eq!(counts.extract_failures, 1);
        assert_eq!(report.failures[0].url, "https://www.onlinegames.io/beta/");
        Ok(())
    }

    #[test]
    fn respects_max_games() -> Result<()> {
        let site = FakeSite::default()
            .page(BASE, listing(&["a1", "a2", "a3"]))
            .page("https://www.onlinegames.io/a1/", detail("a1"))
            .page("https://www.onlinegames.io/a2/", detail("a2"));
        let scraper = Scraper::new(site, BASE, Duration::ZERO)?;

        let report = scraper.scrape(2);
        assert_eq!(report.links_found, 3);
        assert_eq!(report.candidates.len(), 2);
        assert!(report.failures.is_empty());
        Ok(())
    }

    #[test]
    fn missing_listing_yields_empty_report() -> Result<()> {
        let scraper = Scraper::new(FakeSite::default().status(BASE, 503), BASE, Duration::ZERO)?;
        let report = scraper.scrape(10);
        assert!(report.candidates.is_empty());
        assert!(matches!(
            report.listing_error,
            Some(FetchError::Status { status: 503, .. })
        ));
        Ok(())
    }
}
