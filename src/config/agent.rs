//! Agent configuration: LLM gateway wiring and the graph-view toggle.
//!
//! `[agent]` in config.toml, with a nested `ollama.*` dotted-key table for
//! the LLM server's model names (§6 of the design doc).

use serde::Deserialize;

/// Model names and endpoint for the local LLM server.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the local inference server.
    pub base_url: String,
    /// Vision/OCR model name.
    pub vision_model: String,
    /// Dense-embedding model name.
    pub embedding_model: String,
    /// Headline/report-writing model name.
    pub reasoning_model: String,
    /// Family prefix used to resolve `reasoning_model` if it's absent
    /// from the server's inventory.
    pub reasoning_family: String,
    /// Translation model name.
    pub translator_model: String,
    /// Family prefix used to resolve `translator_model`.
    pub translator_family: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            vision_model: "glm-ocr:latest".to_string(),
            embedding_model: "nomic-embed-text-v2-moe:latest".to_string(),
            reasoning_model: "gemma3:4b".to_string(),
            reasoning_family: "gemma3".to_string(),
            translator_model: "gemma3:4b".to_string(),
            translator_family: "gemma3".to_string(),
        }
    }
}

/// Agent (LLM) behavior settings.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Power mode toggles a heavier (slower, better) model set.
    pub power_mode: bool,
    /// Whether the LLM-assisted topic clustering graph view is available.
    pub allow_graph_view: bool,
    /// Local LLM server wiring.
    pub ollama: OllamaConfig,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            power_mode: false,
            allow_graph_view: true,
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FileOllamaConfig {
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,
    pub vision_model: Option<String>,
    pub embedding_model: Option<String>,
    pub reasoning_model: Option<String>,
    pub reasoning_family: Option<String>,
    pub translator_model: Option<String>,
    pub translator_family: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FileAgent {
    pub power_mode: Option<bool>,
    pub allow_graph_view: Option<bool>,
    pub ollama: Option<FileOllamaConfig>,
}

impl Agent {
    pub fn from_file(file: Option<FileAgent>) -> Self {
        let defaults = Self::default();
        let file = file.unwrap_or_default();
        let file_ollama = file.ollama.unwrap_or_default();

        Self {
            power_mode: file.power_mode.unwrap_or(defaults.power_mode),
            allow_graph_view: file.allow_graph_view.unwrap_or(defaults.allow_graph_view),
            ollama: OllamaConfig {
                base_url: file_ollama.base_url.unwrap_or(defaults.ollama.base_url),
                vision_model: file_ollama
                    .vision_model
                    .unwrap_or(defaults.ollama.vision_model),
                embedding_model: file_ollama
                    .embedding_model
                    .unwrap_or(defaults.ollama.embedding_model),
                reasoning_model: file_ollama
                    .reasoning_model
                    .unwrap_or(defaults.ollama.reasoning_model),
                reasoning_family: file_ollama
                    .reasoning_family
                    .unwrap_or(defaults.ollama.reasoning_family),
                translator_model: file_ollama
                    .translator_model
                    .unwrap_or(defaults.ollama.translator_model),
                translator_family: file_ollama
                    .translator_family
                    .unwrap_or(defaults.ollama.translator_family),
            },
        }
    }
}
