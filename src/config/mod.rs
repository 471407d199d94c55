//! Configuration for the passive monitoring pipeline.
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (`{appdir}/config.toml`)
//! 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod agent;
mod headlines;
mod logging;
mod reddit;
mod serialization;
mod user;

#[cfg(test)]
mod tests;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use agent::{Agent, FileAgent, FileOllamaConfig, OllamaConfig};
pub use headlines::{FileHeadlines, Headlines};
pub use logging::{FileLogging, LogRotation, Logging};
pub use reddit::{FileReddit, Reddit};
pub use user::{FileUser, User};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name under the OS application-data root.
const APP_DIR_NAME: &str = "sentinel";

/// Runtime mode selected by `APP_MODE` (or `SENTINEL_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Prod,
    Test,
}

impl AppMode {
    pub fn from_env() -> Self {
        match std::env::var("APP_MODE")
            .or_else(|_| std::env::var("SENTINEL_MODE"))
            .unwrap_or_default()
            .to_uppercase()
            .as_str()
        {
            "TEST" => Self::Test,
            _ => Self::Prod,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Top-level debug toggle.
    pub debug_mode: bool,
    /// Whether the reddit/board panel is visible in the (external) UI shell.
    pub ui_reddit_visible: bool,

    /// Whether to enable the TUI front-end (can be disabled for headless mode).
    pub enable_tui: bool,

    /// OS application-data directory (holds the database, logs, and config).
    pub data_dir: PathBuf,

    /// `PROD` or `TEST` — selects the live or synthetic scraper/store.
    pub mode: AppMode,

    pub agent: Agent,
    pub reddit: Reddit,
    pub headlines: Headlines,
    pub user: User,
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug_mode: false,
            ui_reddit_visible: true,
            enable_tui: true,
            data_dir: default_data_dir(),
            mode: AppMode::Prod,
            agent: Agent::default(),
            reddit: Reddit::default(),
            headlines: Headlines::default(),
            user: User::default(),
            logging: Logging::default(),
        }
    }
}

/// Resolve the OS-specific application data directory:
/// - macOS: `~/Library/Application Support/{app}`
/// - Windows: `%APPDATA%\{app}`, falling back to `~/AppData/Roaming/{app}`
/// - Linux: `$XDG_DATA_HOME/{app}`, falling back to `~/.local/share/{app}`
fn default_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join(APP_DIR_NAME);
    }

    if cfg!(windows) {
        if let Some(home) = dirs::home_dir() {
            return home.join("AppData").join("Roaming").join(APP_DIR_NAME);
        }
    } else if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("share").join(APP_DIR_NAME);
    }

    PathBuf::from(".").join(APP_DIR_NAME)
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure — mirrors `Config`, every field optional so that
/// missing keys fall back to defaults and unknown keys are ignored.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct FileConfig {
    pub debug_mode: Option<bool>,
    pub ui_reddit_visible: Option<bool>,

    pub agent: Option<FileAgent>,
    pub reddit: Option<FileReddit>,
    pub headlines: Option<FileHeadlines>,
    pub user: Option<FileUser>,

    /// Optional `[logging]` section (ambient, not part of the minimal example file).
    pub logging: Option<FileLogging>,
}

/// Logs one WARN per top-level section absent from the loaded file
/// (defaults are used silently otherwise) — called once, at load time, so
/// there's no need for a separate dedup registry.
fn warn_missing_sections(file: &FileConfig) {
    if file.agent.is_none() {
        tracing::warn!("config: [agent] section missing, using defaults");
    }
    if file.reddit.is_none() {
        tracing::warn!("config: [reddit] section missing, using defaults");
    }
    if file.headlines.is_none() {
        tracing::warn!("config: [headlines] section missing, using defaults");
    }
    if file.user.is_none() {
        tracing::warn!("config: [user] section missing, using defaults");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Path to `config.toml` inside the application data directory.
    pub fn config_path() -> Option<PathBuf> {
        Some(default_data_dir().join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist. Called during
    /// startup to help operators discover configuration options.
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }

        let template = Self::default().to_toml();
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists.
    ///
    /// # Panics
    /// If the config file exists but cannot be parsed. A broken config
    /// should fail fast with a clear error rather than silently falling
    /// back to defaults while the operator debugs the wrong thing.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("\nCONFIG ERROR - failed to parse configuration file\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  To reset, delete the file and restart sentinel.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("\nCONFIG ERROR - cannot read configuration file\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env vars > config file > defaults.
    pub fn from_env() -> Self {
        let file = Self::load_file_config();
        warn_missing_sections(&file);

        let debug_mode = std::env::var("SENTINEL_DEBUG")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(file.debug_mode)
            .unwrap_or(false);

        let ui_reddit_visible = file.ui_reddit_visible.unwrap_or(true);

        let enable_tui = std::env::var("SENTINEL_NO_TUI")
            .map(|v| v != "1" && !v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let data_dir = std::env::var("SENTINEL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mode = AppMode::from_env();

        let agent = Agent::from_file(file.agent);
        let reddit = Reddit::from_file(file.reddit);
        let headlines = Headlines::from_file(file.headlines);
        let user = User::from_file(file.user);
        let logging = Logging::from_file(file.logging);

        Self {
            debug_mode,
            ui_reddit_visible,
            enable_tui,
            data_dir,
            mode,
            agent,
            reddit,
            headlines,
            user,
            logging,
        }
    }

    /// Atomically persist the current config to `config.toml`: write to a
    /// `.tmp` sibling, fsync, then rename over the target.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine config path",
            ));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        let toml = self.to_toml();

        {
            let mut file = std::fs::File::create(&tmp_path)?;
            use std::io::Write;
            file.write_all(toml.as_bytes())?;
            file.sync_all()?;
        }

        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Path to the sqlite database file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sentinel.db")
    }

    /// Path to the log directory inside the data directory.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
