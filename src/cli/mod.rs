//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{chat::ChatArgs, check::CheckArgs, serve::ServeArgs};

#[derive(Parser)]
#[command(name = "hypnobot")]
#[command(about = "HypnoBot - multi-agent hypnotherapy chatbot", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Load settings from this file instead of .hypnobot/
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the bot, interactively or with a single message
    Chat(ChatArgs),

    /// Run the HTTP API
    Serve(ServeArgs),

    /// Verify the credential and crew definitions without calling the backend
    Check(CheckArgs),
}

/// Print a command failure and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({ "success": false, "error": format!("{err:#}") });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1)
}
