//! Implementation of the `hypnobot chat` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::output::{create_spinner, output, CommandOutput};
use crate::domain::models::{ChatResult, Config};
use crate::services::pipeline::HypnoPipeline;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Process a single message and exit
    #[arg(short, long)]
    pub message: Option<String>,

    /// Override the default model for agents that do not pin one
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ChatOutput(pub ChatResult);

impl CommandOutput for ChatOutput {
    fn to_human(&self) -> String {
        let result = &self.0;
        let mut lines = vec![format!(
            "\n{} {}",
            console::style("HypnoBot:").cyan().bold(),
            result.final_response
        )];
        if result.is_degraded() {
            lines.push(
                console::style("(partial answer: the pipeline did not finish)")
                    .dim()
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ChatArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(model) = args.model {
        config.backend.default_model = model;
    }

    let pipeline = HypnoPipeline::from_config(&config).context("Failed to initialize the pipeline")?;

    if let Some(message) = args.message {
        let result = ask(&pipeline, &message, json_mode).await?;
        output(&ChatOutput(result), json_mode);
        return Ok(());
    }

    interactive(&pipeline, json_mode).await
}

async fn interactive(pipeline: &HypnoPipeline, json_mode: bool) -> Result<()> {
    if !json_mode {
        println!("HypnoBot - Hypnotherapy Chatbot");
        println!("Type 'exit' to quit the chat");
        println!("{}", "-".repeat(50));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        if !json_mode {
            stdout.write_all(b"\nYou: ").await?;
            stdout.flush().await?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_exit_word(message) {
            if !json_mode {
                println!("HypnoBot: Goodbye! Take care.");
            }
            break;
        }

        match ask(pipeline, message, json_mode).await {
            Ok(result) => output(&ChatOutput(result), json_mode),
            Err(err) => eprintln!("{} {err:#}", console::style("Error:").red().bold()),
        }
    }

    Ok(())
}

/// Run one message, cancelling the in-flight chain on Ctrl-C.
async fn ask(pipeline: &HypnoPipeline, message: &str, json_mode: bool) -> Result<ChatResult> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let spinner = create_spinner("Thinking...", json_mode);
    let result = pipeline.process_with_cancel(message, &cancel).await;
    spinner.finish_and_clear();
    watcher.abort();

    Ok(result?)
}

fn is_exit_word(message: &str) -> bool {
    EXIT_WORDS.iter().any(|word| message.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChatMetadata, SafetyLevel};

    #[test]
    fn test_exit_words() {
        assert!(is_exit_word("exit"));
        assert!(is_exit_word("QUIT"));
        assert!(is_exit_word("Bye"));
        assert!(!is_exit_word("goodbye for now"));
    }

    #[test]
    fn test_json_output_is_the_chat_result() {
        let result = ChatResult::new("draft", "final", SafetyLevel::Minor, ChatMetadata::default());
        let json = ChatOutput(result).to_json();
        assert_eq!(json["final_response"], "final");
        assert_eq!(json["safety_level"], 1);
    }

    #[test]
    fn test_human_output_flags_degraded_results() {
        let metadata = ChatMetadata {
            error: Some("timed out".to_string()),
            ..Default::default()
        };
        let result = ChatResult::new("", "partial", SafetyLevel::Caution, metadata);
        assert!(ChatOutput(result).to_human().contains("partial answer"));
    }
}
