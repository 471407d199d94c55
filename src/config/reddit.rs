//! Board (subreddit) monitoring configuration — `[reddit]` in config.toml.

use serde::Deserialize;

/// Scraping and clustering tunables for the monitored boards.
#[derive(Debug, Clone)]
pub struct Reddit {
    /// Boards to poll.
    pub subreddits: Vec<String>,
    /// Seconds between ingest cycles.
    pub update_interval_seconds: u64,
    /// Hours a thread may go without activity before cleanup deletes it.
    pub data_retention_hours: u64,
    /// Minimum significance score before a headline is attempted.
    pub significance_threshold: f64,
    /// Minutes an un-reported cluster may sit idle before expiry.
    pub investigation_ttl_minutes: u64,
    /// Cosine-similarity floor for a thread to join an existing cluster.
    pub similarity_threshold: f32,
}

impl Default for Reddit {
    fn default() -> Self {
        Self {
            subreddits: vec!["wallstreetbetsGER".to_string()],
            update_interval_seconds: 60,
            data_retention_hours: 6,
            significance_threshold: 10.0,
            investigation_ttl_minutes: 60,
            similarity_threshold: 0.55,
        }
    }
}

impl Reddit {
    pub fn investigation_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.investigation_ttl_minutes * 60)
    }

    pub fn data_retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.data_retention_hours * 3600)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FileReddit {
    pub subreddits: Option<Vec<String>>,
    pub update_interval_seconds: Option<u64>,
    pub data_retention_hours: Option<u64>,
    pub significance_threshold: Option<f64>,
    pub investigation_ttl_minutes: Option<u64>,
    pub similarity_threshold: Option<f32>,
}

impl Reddit {
    pub fn from_file(file: Option<FileReddit>) -> Self {
        let defaults = Self::default();
        let file = file.unwrap_or_default();

        Self {
            subreddits: file.subreddits.unwrap_or(defaults.subreddits),
            update_interval_seconds: file
                .update_interval_seconds
                .unwrap_or(defaults.update_interval_seconds),
            data_retention_hours: file
                .data_retention_hours
                .unwrap_or(defaults.data_retention_hours),
            significance_threshold: file
                .significance_threshold
                .unwrap_or(defaults.significance_threshold),
            investigation_ttl_minutes: file
                .investigation_ttl_minutes
                .unwrap_or(defaults.investigation_ttl_minutes),
            similarity_threshold: file
                .similarity_threshold
                .unwrap_or(defaults.similarity_threshold),
        }
    }
}
