//! Round-trip coverage for the config serialization/deserialization layer.

use super::*;

#[test]
fn default_config_round_trips_through_toml() {
    let config = Config::default();
    let toml = config.to_toml();
    let parsed: FileConfig = toml::from_str(&toml).expect("default config toml must parse");

    assert_eq!(parsed.debug_mode, Some(config.debug_mode));
    assert_eq!(parsed.ui_reddit_visible, Some(config.ui_reddit_visible));
}

#[test]
fn unknown_keys_are_ignored() {
    let toml = r#"
        debug-mode = true
        this-key-does-not-exist = "whatever"

        [reddit]
        subreddits = ["a", "b"]
        bogus-field = 42
    "#;
    let parsed: FileConfig = toml::from_str(toml).expect("unknown keys must not fail parsing");
    assert_eq!(parsed.debug_mode, Some(true));
    assert_eq!(parsed.reddit.unwrap().subreddits, Some(vec!["a".to_string(), "b".to_string()]));
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let parsed: FileConfig = toml::from_str("debug-mode = true").unwrap();
    let agent = Agent::from_file(parsed.agent);
    let defaults = Agent::default();
    assert_eq!(agent.power_mode, defaults.power_mode);
    assert_eq!(agent.ollama.base_url, defaults.ollama.base_url);
}

#[test]
fn example_config_from_spec_parses() {
    let toml = r#"
debug-mode = false
ui-reddit-visible = true

[agent]
power-mode = false
ollama.vision-model = "glm-ocr:latest"
ollama.embedding-model = "nomic-embed-text-v2-moe:latest"
allow-graph-view = true

[reddit]
subreddits = ["wallstreetbetsGER"]
update-interval-seconds = 60
data-retention-hours = 6
significance-threshold = 10.0
investigation-ttl-minutes = 60
similarity-threshold = 0.55

[headlines]
enabled = true
show-all = true
topics = []

[user]
language = "de"
"#;
    let parsed: FileConfig = toml::from_str(toml).expect("spec example config must parse");
    let reddit = Reddit::from_file(parsed.reddit);
    assert_eq!(reddit.subreddits, vec!["wallstreetbetsGER".to_string()]);
    assert_eq!(reddit.significance_threshold, 10.0);

    let agent = Agent::from_file(parsed.agent);
    assert_eq!(agent.ollama.vision_model, "glm-ocr:latest");
    assert_eq!(agent.ollama.embedding_model, "nomic-embed-text-v2-moe:latest");
}
