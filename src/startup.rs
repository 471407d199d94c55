// Startup module - banner and module-loading status, printed before the
// TUI takes over the screen (or straight to stdout in headless mode).

use crate::config::{AppMode, Config, VERSION};

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module loading result for display.
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: &'static str,
}

/// Derives the module status list from the running config. Single source
/// of truth for both the console banner and the `tracing` boot log.
fn get_module_status(config: &Config) -> Vec<ModuleStatus> {
    vec![
        ModuleStatus { name: "storage", enabled: true, description: "Thread/comment persistence" },
        ModuleStatus { name: "scraper", enabled: !config.reddit.subreddits.is_empty(), description: "Board ingest" },
        ModuleStatus { name: "clustering", enabled: true, description: "Investigation clusters" },
        ModuleStatus { name: "headlines", enabled: config.headlines.enabled, description: "LLM headline generation" },
        ModuleStatus { name: "graph-view", enabled: config.agent.allow_graph_view, description: "LLM-assisted topic graph" },
        ModuleStatus { name: "tui", enabled: config.enable_tui, description: "Terminal interface" },
    ]
}

/// Print the startup banner and module loading status.
pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}sentinel{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Passive monitoring pipeline{RESET}");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!();

    println!("  {DIM}Loading modules...{RESET}");
    for module in &get_module_status(config) {
        print_module_status(module);
    }
    println!();

    println!(
        "  {MAGENTA}▸{RESET} Monitoring {BOLD}{}{RESET} board(s) every {}s",
        config.reddit.subreddits.len(),
        config.reddit.update_interval_seconds
    );
    if config.mode == AppMode::Test {
        println!("  {YELLOW}▸{RESET} {YELLOW}Test mode active{RESET} {DIM}(synthetic scraper){RESET}");
    }
    println!();
}

fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!("    {icon} {style}{:<12}{RESET} {DIM}{}{RESET}", module.name, module.description);
}

/// Mirror the startup banner into the `tracing` log so it shows up in the
/// TUI's log panel and the rolling file log, not just stdout.
pub fn log_startup(config: &Config) {
    tracing::info!("═══════════════════════════════════");
    tracing::info!("  sentinel v{}", VERSION);
    tracing::info!("═══════════════════════════════════");

    for module in &get_module_status(config) {
        let icon = if module.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, module.name, module.description);
    }

    tracing::info!(
        "▸ monitoring {} board(s) every {}s",
        config.reddit.subreddits.len(),
        config.reddit.update_interval_seconds
    );
    if config.mode == AppMode::Test {
        tracing::info!("▸ test mode active (synthetic scraper)");
    }
    tracing::info!("ready.");
}
