//! TOML emission for `sentinel config show` / `--reset` / atomic `save()`.
//!
//! Built as a dedicated serializable mirror rather than deriving `Serialize`
//! directly on [`Config`] — several fields (`PathBuf`, `AppMode`, the derived
//! data directory) don't belong in the on-disk file, and the mirror lets the
//! emitted key order match the `[agent]` / `[reddit]` / `[headlines]` /
//! `[user]` layout documented for operators.

use serde::Serialize;

use super::{Agent, Config, Headlines, OllamaConfig, Reddit, User};

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TomlOllama<'a> {
    base_url: &'a str,
    vision_model: &'a str,
    embedding_model: &'a str,
    reasoning_model: &'a str,
    reasoning_family: &'a str,
    translator_model: &'a str,
    translator_family: &'a str,
}

impl<'a> From<&'a OllamaConfig> for TomlOllama<'a> {
    fn from(o: &'a OllamaConfig) -> Self {
        Self {
            base_url: &o.base_url,
            vision_model: &o.vision_model,
            embedding_model: &o.embedding_model,
            reasoning_model: &o.reasoning_model,
            reasoning_family: &o.reasoning_family,
            translator_model: &o.translator_model,
            translator_family: &o.translator_family,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TomlAgent<'a> {
    power_mode: bool,
    allow_graph_view: bool,
    ollama: TomlOllama<'a>,
}

impl<'a> From<&'a Agent> for TomlAgent<'a> {
    fn from(a: &'a Agent) -> Self {
        Self {
            power_mode: a.power_mode,
            allow_graph_view: a.allow_graph_view,
            ollama: (&a.ollama).into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TomlReddit<'a> {
    subreddits: &'a [String],
    update_interval_seconds: u64,
    data_retention_hours: u64,
    significance_threshold: f64,
    investigation_ttl_minutes: u64,
    similarity_threshold: f32,
}

impl<'a> From<&'a Reddit> for TomlReddit<'a> {
    fn from(r: &'a Reddit) -> Self {
        Self {
            subreddits: &r.subreddits,
            update_interval_seconds: r.update_interval_seconds,
            data_retention_hours: r.data_retention_hours,
            significance_threshold: r.significance_threshold,
            investigation_ttl_minutes: r.investigation_ttl_minutes,
            similarity_threshold: r.similarity_threshold,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TomlHeadlines<'a> {
    enabled: bool,
    show_all: bool,
    topics: &'a [String],
}

impl<'a> From<&'a Headlines> for TomlHeadlines<'a> {
    fn from(h: &'a Headlines) -> Self {
        Self {
            enabled: h.enabled,
            show_all: h.show_all,
            topics: &h.topics,
        }
    }
}

#[derive(Serialize)]
struct TomlUser<'a> {
    language: &'a str,
}

impl<'a> From<&'a User> for TomlUser<'a> {
    fn from(u: &'a User) -> Self {
        Self {
            language: &u.language,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TomlConfig<'a> {
    debug_mode: bool,
    ui_reddit_visible: bool,
    agent: TomlAgent<'a>,
    reddit: TomlReddit<'a>,
    headlines: TomlHeadlines<'a>,
    user: TomlUser<'a>,
}

impl Config {
    /// Render the current configuration as TOML, suitable for `config show`
    /// or writing out to disk.
    pub fn to_toml(&self) -> String {
        let mirror = TomlConfig {
            debug_mode: self.debug_mode,
            ui_reddit_visible: self.ui_reddit_visible,
            agent: (&self.agent).into(),
            reddit: (&self.reddit).into(),
            headlines: (&self.headlines).into(),
            user: (&self.user).into(),
        };

        toml::to_string_pretty(&mirror).unwrap_or_else(|_| String::new())
    }
}
