//! History command handler.

use clap::Args;
use coldcase_core::{config::AppConfig, AppResult};
use coldcase_evidence::EvidenceEngine;

/// Show or clear recent questions
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Delete the history instead of showing it
    #[arg(long)]
    pub clear: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub fn execute(&self, config: &AppConfig, user: &str) -> AppResult<()> {
        tracing::info!("Executing history command");

        let engine = EvidenceEngine::open(config, None)?;

        if self.clear {
            let removed = engine.clear_history(user)?;
            println!("Removed {} entries for {}", removed, user);
            return Ok(());
        }

        let chats = engine.history(user)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chats)?);
        } else if chats.is_empty() {
            println!("No questions asked yet.");
        } else {
            for chat in &chats {
                println!("[{}] Q: {}", chat.asked_at.format("%Y-%m-%d %H:%M"), chat.question);
                println!("A: {}", chat.answer);
                println!();
            }
        }

        Ok(())
    }
}
