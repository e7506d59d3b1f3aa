mod output;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

use btwgames_core::{
    config::{self, AppConfig},
    pipeline::{self, RunOptions},
    store::{GameQuery, GameRepository, SortOrder, DEFAULT_PER_PAGE},
    HttpFetcher, Scraper,
};

#[derive(Parser)]
#[command(name = "btwgames")]
#[command(version, about = "Scrape, catalogue and publish browser games", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Extra configuration file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Collection file to read and update
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// SQLite catalogue database
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape, merge, import and regenerate the site
    Build {
        /// Maximum games to scrape
        #[arg(long)]
        max_games: Option<usize>,

        /// Reuse the existing collection without fetching
        #[arg(long)]
        skip_fetch: bool,

        /// Target directory for the generated site
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Publish straight from the collection file
        #[arg(long)]
        no_db: bool,

        /// Back up the collection file before rewriting it
        #[arg(long)]
        backup: bool,
    },

    /// Scrape the listing site and append new games to the collection
    Scrape {
        /// Maximum games to scrape
        #[arg(long)]
        max_games: Option<usize>,

        /// Back up the collection file before rewriting it
        #[arg(long)]
        backup: bool,
    },

    /// Import the collection into the database
    Import,

    /// Regenerate the static site
    Generate {
        /// Target directory for the generated site
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Read games from the database instead of the collection file
        #[arg(long)]
        from_db: bool,
    },

    /// List catalogued games
    List {
        /// Category slug
        #[arg(short, long)]
        category: Option<String>,

        /// Text searched in titles, descriptions and tags
        #[arg(short, long)]
        search: Option<String>,

        /// popular, newest or name
        #[arg(long, default_value = "popular")]
        sort: SortOrder,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Games per page (at most 100)
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,

        /// Only games flagged as new
        #[arg(long)]
        new: bool,
    },

    /// Show one game by id or slug
    Show {
        /// Numeric id or slug
        game: String,
    },

    /// Record a play of a game
    Play {
        /// Game id
        id: i64,

        /// Session length in seconds
        #[arg(short, long, default_value_t = 0)]
        duration: u32,
    },

    /// Play count and average session length of one game
    PlayStats {
        /// Game id
        id: i64,
    },

    /// Hide a game from listings and the published site
    Deactivate {
        /// Game id
        id: i64,
    },

    /// Catalogue statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    config::ensure_default_config()?;
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(data_file) = cli.data_file.clone() {
        config.data_file = data_file;
    }
    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }
    debug!(?config, "loaded configuration");

    match cli.command {
        Command::Build {
            max_games,
            skip_fetch,
            output_dir,
            no_db,
            backup,
        } => {
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            let options = RunOptions {
                max_games: max_games.unwrap_or(config.max_games),
                skip_fetch,
                backup,
                import: !no_db,
                generate: true,
            };
            let scraper = if skip_fetch {
                None
            } else {
                Some(Scraper::<HttpFetcher>::from_config(&config)?)
            };
            let summary = pipeline::run(&config, scraper.as_ref(), &options)?;
            output::run_summary(&summary, cli.json)?;
        }
        Command::Scrape { max_games, backup } => {
            let scraper = Scraper::<HttpFetcher>::from_config(&config)?;
            let max_games = max_games.unwrap_or(config.max_games);
            let (_, summary) = pipeline::scrape(&config, &scraper, max_games, backup)?;
            output::run_summary(&summary, cli.json)?;
        }
        Command::Import => {
            let repository = GameRepository::open(&config.database_path)?;
            let summary = pipeline::import(&config, &repository)?;
            output::import_summary(&summary, cli.json)?;
        }
        Command::Generate {
            output_dir,
            from_db,
        } => {
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            let report = if from_db {
                let repository = GameRepository::open(&config.database_path)?;
                pipeline::generate_from_db(&config, &repository)?
            } else {
                pipeline::generate_from_collection(&config)?
            };
            output::generation_report(&report, &config.output_dir, cli.json)?;
        }
        Command::List {
            category,
            search,
            sort,
            page,
            per_page,
            new,
        } => {
            let repository = GameRepository::open(&config.database_path)?;
            let page = repository.list(&GameQuery {
                category,
                search,
                new_only: new,
                sort,
                page,
                per_page,
            })?;
            output::game_page(&page, cli.json)?;
        }
        Command::Show { game } => {
            let repository = GameRepository::open(&config.database_path)?;
            let Some(found) = repository.find(&game)? else {
                bail!("no game `{game}`");
            };
            output::game_detail(&found, cli.json)?;
        }
        Command::Play { id, duration } => {
            let repository = GameRepository::open(&config.database_path)?;
            if !repository.record_play(id, duration)? {
                bail!("no game with id {id}");
            }
            println!("Recorded play of game {id}");
        }
        Command::PlayStats { id } => {
            let repository = GameRepository::open(&config.database_path)?;
            let Some(stats) = repository.game_stats(id)? else {
                bail!("no game with id {id}");
            };
            output::play_stats(&stats, cli.json)?;
        }
        Command::Deactivate { id } => {
            let repository = GameRepository::open(&config.database_path)?;
            if !repository.deactivate(id)? {
                bail!("no active game with id {id}");
            }
            println!("Deactivated game {id}; regenerate the site to unpublish it");
        }
        Command::Stats => {
            let repository = GameRepository::open(&config.database_path)?;
            output::stats(&repository.stats()?, &repository.categories()?, cli.json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("btwgames.log"))?;

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
