// SafeTravels - main.rs
// Loads layered config, initialises tracing and dispatches the CLI.

use clap::Parser;
use safetravels::cli::{dispatch, Cli};
use safetravels::config_loader::load_config;
use std::process::exit;
use tracing::Level;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            exit(1);
        }
    };

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.log_level)
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli, config).await {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}
