//! SQLite-backed catalogue.
//!
//! The collection file stays the source of truth for scraping; the database
//! adds slugs, categories, play counts and "new" flags on top of it and
//! serves the read queries used by the CLI and the site generator.

mod models;
mod repository;
pub mod schema;

pub use models::{
    CatalogStats, CategoryCount, GamePlayStats, GameQuery, GameRow, ImportSummary, Page,
    SortOrder, DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
pub use repository::GameRepository;
