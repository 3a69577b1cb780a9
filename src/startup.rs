// Startup banner printed before the serve loop takes over.

use crate::config::{Config, DESCRIPTION, NAME, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Print the startup banner with version and listen address.
pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}{NAME}{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}{DESCRIPTION}{RESET}");
    println!();
    println!(
        "  {MAGENTA}▸{RESET} OpenAI surface    {BOLD}http://{}/v1/chat/completions{RESET}",
        config.bind_addr
    );
    println!(
        "  {MAGENTA}▸{RESET} Anthropic surface {BOLD}http://{}/v1/messages{RESET}",
        config.bind_addr
    );
    println!();
}

/// Log the same facts through tracing for headless captures.
pub fn log_startup(config: &Config) {
    tracing::info!("{NAME} v{VERSION} starting");
    tracing::info!("binding to {}", config.bind_addr);
}
