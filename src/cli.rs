// CLI module - command-line argument parsing and handlers
//
// Provides a `config` subcommand family (`--show`, `--reset`, `--edit`,
// `--update`, `--path`) plus the default `run` action's flags: `--headless`
// to disable the TUI and `--mode {prod,test}` to override `APP_MODE`.

use crate::config::{AppMode, Config, VERSION};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::Command;

/// sentinel - continuous social-media observation engine
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version = VERSION)]
#[command(about = "Passive monitoring pipeline: scrape, cluster, score, headline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Disable the terminal front-end; run the monitor headless until Ctrl+C.
    #[arg(long)]
    pub headless: bool,

    /// Override `APP_MODE`: `prod` runs the live scraper, `test` runs the
    /// synthetic stub scraper against an in-memory-seeded store.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(long)]
        edit: bool,

        /// Update config with new defaults (preserves user values)
        #[arg(long)]
        update: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolves `--mode` to an `AppMode`, if given. Unknown values fall
    /// through to `AppMode::Prod`, matching `AppMode::from_env`'s leniency.
    pub fn mode(&self) -> Option<AppMode> {
        self.mode.as_deref().map(|m| match m.to_uppercase().as_str() {
            "TEST" => AppMode::Test,
            _ => AppMode::Prod,
        })
    }
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub fn handle_cli(cli: &Cli) -> bool {
    match &cli.command {
        Some(Commands::Config {
            show,
            reset,
            edit,
            update,
            path,
        }) => {
            if *path {
                handle_config_path();
            } else if *show {
                handle_config_show();
            } else if *reset {
                handle_config_reset();
            } else if *edit {
                handle_config_edit();
            } else if *update {
                handle_config_update();
            } else {
                println!("Usage: sentinel config [--show|--reset|--edit|--update|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --edit    Open config file in $EDITOR");
                println!("  --update  Update config with new defaults (preserves user values)");
                println!("  --path    Show config file path");
            }
            true
        }
        None => false, // No subcommand: fall through to `run`.
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = Config::from_env();

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!("debug-mode = {}", config.debug_mode);
    println!("ui-reddit-visible = {}", config.ui_reddit_visible);
    println!("data-dir = {:?}", config.data_dir.display().to_string());
    println!(
        "mode = {}",
        match config.mode {
            AppMode::Prod => "PROD",
            AppMode::Test => "TEST",
        }
    );
    println!();
    println!("[agent]");
    println!("power-mode = {}", config.agent.power_mode);
    println!("allow-graph-view = {}", config.agent.allow_graph_view);
    println!("ollama.base-url = {:?}", config.agent.ollama.base_url);
    println!("ollama.vision-model = {:?}", config.agent.ollama.vision_model);
    println!("ollama.embedding-model = {:?}", config.agent.ollama.embedding_model);
    println!("ollama.reasoning-model = {:?}", config.agent.ollama.reasoning_model);
    println!("ollama.translator-model = {:?}", config.agent.ollama.translator_model);
    println!();
    println!("[reddit]");
    println!("subreddits = {:?}", config.reddit.subreddits);
    println!("update-interval-seconds = {}", config.reddit.update_interval_seconds);
    println!("data-retention-hours = {}", config.reddit.data_retention_hours);
    println!("significance-threshold = {}", config.reddit.significance_threshold);
    println!("investigation-ttl-minutes = {}", config.reddit.investigation_ttl_minutes);
    println!("similarity-threshold = {}", config.reddit.similarity_threshold);
    println!();
    println!("[headlines]");
    println!("enabled = {}", config.headlines.enabled);
    println!("show-all = {}", config.headlines.show_all);
    println!("topics = {:?}", config.headlines.topics);
    println!();
    println!("[user]");
    println!("language = {:?}", config.user.language);

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if path.exists() {
        eprint!("Config file exists at {}. Overwrite? [y/N] ", path.display());
        std::io::stderr().flush().unwrap();

        let mut input = String::new();
        std::io::stdin().read_line(&mut input).unwrap();

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return;
        }
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = Config::default().save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

fn handle_config_edit() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| if cfg!(windows) { "notepad".to_string() } else { "nano".to_string() });

    println!("Opening {} with {}", path.display(), editor);

    let status = Command::new(&editor).arg(&path).status();

    match status {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("Editor exited with status: {}", s);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to launch editor '{}': {}", editor, e);
            eprintln!("Set $EDITOR environment variable to your preferred editor");
            std::process::exit(1);
        }
    }
}

fn handle_config_update() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
        return;
    }

    let backup_path = path.with_extension("toml.bak");
    if let Err(e) = std::fs::copy(&path, &backup_path) {
        eprintln!("Warning: Could not create backup: {}", e);
    } else {
        println!("Backup created: {}", backup_path.display());
    }

    let existing = Config::from_env();
    if let Err(e) = existing.save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config updated with latest structure: {}", path.display());
    println!("Your values have been preserved.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flag_maps_test_case_insensitively() {
        let cli = Cli {
            command: None,
            headless: false,
            mode: Some("Test".to_string()),
        };
        assert_eq!(cli.mode(), Some(AppMode::Test));
    }

    #[test]
    fn no_mode_flag_is_none() {
        let cli = Cli {
            command: None,
            headless: false,
            mode: None,
        };
        assert_eq!(cli.mode(), None);
    }
}
