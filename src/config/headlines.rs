//! Headline generation configuration — `[headlines]` in config.toml.

use serde::Deserialize;

/// Controls whether/which headlines the report builder is allowed to emit.
#[derive(Debug, Clone)]
pub struct Headlines {
    pub enabled: bool,
    /// When true (or `topics` is empty), no topic filter is applied.
    pub show_all: bool,
    /// Topic allow-list used when `show_all` is false.
    pub topics: Vec<String>,
}

impl Default for Headlines {
    fn default() -> Self {
        Self {
            enabled: true,
            show_all: true,
            topics: Vec::new(),
        }
    }
}

impl Headlines {
    /// True when no topic restriction should be injected into the prompt.
    pub fn unrestricted(&self) -> bool {
        self.show_all || self.topics.is_empty()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FileHeadlines {
    pub enabled: Option<bool>,
    pub show_all: Option<bool>,
    pub topics: Option<Vec<String>>,
}

impl Headlines {
    pub fn from_file(file: Option<FileHeadlines>) -> Self {
        let defaults = Self::default();
        let file = file.unwrap_or_default();

        Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            show_all: file.show_all.unwrap_or(defaults.show_all),
            topics: file.topics.unwrap_or(defaults.topics),
        }
    }
}
