//! User-facing configuration — `[user]` in config.toml.

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct User {
    /// ISO 639-1 language code, drives the i18n layer (external collaborator).
    pub language: String,
}

impl Default for User {
    fn default() -> Self {
        Self {
            language: "de".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileUser {
    pub language: Option<String>,
}

impl User {
    pub fn from_file(file: Option<FileUser>) -> Self {
        let defaults = Self::default();
        let file = file.unwrap_or_default();

        Self {
            language: file.language.unwrap_or(defaults.language),
        }
    }
}
