//! Logging configuration: ambient, not part of the user-facing TOML
//! sections, but needed to route structured logs to a rotated file.

use serde::Deserialize;
use std::path::PathBuf;

/// Log file rotation strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl LogRotation {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "never" => Self::Never,
            _ => Self::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct Logging {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    pub file_prefix: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: PathBuf::from("logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "sentinel".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl Logging {
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let defaults = Self::default();
        let file = file.unwrap_or_default();

        Self {
            level: file.level.unwrap_or(defaults.level),
            file_dir: file.file_dir.map(PathBuf::from).unwrap_or(defaults.file_dir),
            file_rotation: file
                .file_rotation
                .map(|s| LogRotation::from_str(&s))
                .unwrap_or(defaults.file_rotation),
            file_prefix: file.file_prefix.unwrap_or(defaults.file_prefix),
        }
    }
}
