#![warn(clippy::all, missing_docs)]

//! Core domain logic for the btwgames catalogue toolchain.
//!
//! This crate hosts the game models, configuration handling, the listing-site
//! scraper, the append-only merge, the collection file and SQLite catalogue,
//! and the static site generator used by the `btwgames` command line.

pub mod collection;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod scrape;
pub mod site;
pub mod slug;
pub mod store;
pub mod taxonomy;

pub use collection::Collection;
pub use config::AppConfig;
pub use merge::{MergeSummary, Merger};
pub use models::{GameRecord, GameType, IdentityKey};
pub use pipeline::{RunOptions, RunSummary};
pub use scrape::{HttpFetcher, PageSource, Scraper};
pub use site::SiteGenerator;
pub use store::GameRepository;
