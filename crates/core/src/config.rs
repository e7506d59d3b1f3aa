//! Application configuration.
//!
//! Values are layered: built-in defaults, the user config file under
//! `~/.config/btwgames/config.toml`, an optional explicit file, and finally
//! `BTWGAMES__*` environment variables (e.g. `BTWGAMES__MAX_GAMES=50`).

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the user config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "btwgames";
/// Config file name.
pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_BASE_URL: &str = "https://www.onlinegames.io";
const DEFAULT_SITE_URL: &str = "https://btwgame.com";
const DEFAULT_SITE_NAME: &str = "BTW Games";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Runtime settings shared by every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing site scraped for new games.
    pub base_url: String,
    /// Public origin of the generated site, used for canonical links.
    pub site_url: String,
    /// Display name of the generated site.
    pub site_name: String,
    /// Persisted collection file.
    pub data_file: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Target directory for generated artifacts.
    pub output_dir: PathBuf,
    /// Upper bound on candidates per scrape run.
    pub max_games: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Pause between detail page requests in milliseconds.
    pub request_delay_ms: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Number of most recently added games published as new.
    pub new_games_count: usize,
    /// Maximum related games listed on a detail page.
    pub related_games: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            data_file: PathBuf::from("games_data.json"),
            database_path: PathBuf::from("games.db"),
            output_dir: PathBuf::from("static_html"),
            max_games: 100,
            request_timeout_secs: 10,
            request_delay_ms: 300,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            new_games_count: 12,
            related_games: 6,
        }
    }
}

impl AppConfig {
    /// Load configuration from the user config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering `extra` on top of the user config file.
    pub fn load_from(extra: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = default_config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        if let Some(path) = extra {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("BTWGAMES")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize::<AppConfig>()
            .context("failed to parse configuration")?;
        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Politeness delay as a [`Duration`].
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Location of the user config file, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Write a config file populated with defaults when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    match default_config_path() {
        Some(path) => write_default_config(&path),
        None => Ok(()),
    }
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }

    let mut contents = String::from("# btwgames configuration\n");
    contents.push_str(
        &toml::to_string_pretty(&AppConfig::default())
            .context("failed to render default configuration")?,
    );
    fs::write(path, contents)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        write_default_config(&path)?;
        assert!(path.exists());

        let loaded: AppConfig = Config::builder()
            .add_source(File::from(path.clone()))
            .build()?
            .try_deserialize()?;
        assert_eq!(loaded.max_games, 100);
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
        assert_eq!(loaded.output_dir, PathBuf::from("static_html"));

        let written: toml::Table = toml::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(
            written.get("user_agent").and_then(|value| value.as_str()),
            Some(DEFAULT_USER_AGENT)
        );
        assert_eq!(
            written.get("request_timeout_secs").and_then(|value| value.as_integer()),
            Some(10)
        );

        // Existing files are left untouched.
        fs::write(&path, "max_games = 5\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "max_games = 5\n");
        Ok(())
    }

    #[test]
    fn explicit_file_overrides_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("override.toml");
        fs::write(&path, "max_games = 25\nrequest_delay_ms = 0\n")?;

        let config = AppConfig::load_from(Some(&path))?;
        assert_eq!(config.max_games, 25);
        assert_eq!(config.request_delay(), Duration::ZERO);
        assert_eq!(config.new_games_count, 12);
        Ok(())
    }
}
