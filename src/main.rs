//! HypnoBot CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use hypnobot::cli::{commands, handle_error, Cli, Commands};
use hypnobot::domain::models::Config;
use hypnobot::infrastructure::config::ConfigLoader;
use hypnobot::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command, cli.config.as_deref(), cli.json).await {
        handle_error(&err, cli.json);
    }
}

async fn run(command: Commands, config_path: Option<&std::path::Path>, json_mode: bool) -> Result<()> {
    let config = load_config(config_path)?;
    init_logging(&config.logging)?;

    match command {
        Commands::Chat(args) => commands::chat::execute(args, config, json_mode).await,
        Commands::Serve(args) => commands::serve::execute(args, config).await,
        Commands::Check(args) => commands::check::execute(args, config, json_mode),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => ConfigLoader::load().context("Failed to load configuration"),
    }
}
