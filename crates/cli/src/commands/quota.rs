//! Quota command handler.

use clap::Args;
use coldcase_core::{config::AppConfig, AppResult};
use coldcase_evidence::EvidenceEngine;

/// Show the remaining daily questions
#[derive(Args, Debug)]
pub struct QuotaCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QuotaCommand {
    pub fn execute(&self, config: &AppConfig, user: &str) -> AppResult<()> {
        tracing::info!("Executing quota command");

        let engine = EvidenceEngine::open(config, None)?;
        let status = engine.quota_status(user)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!(
                "{}: {} of {} questions used, {} remaining",
                user, status.used, status.limit, status.remaining
            );
            println!("Resets at {}", status.resets_at.format("%Y-%m-%d %H:%M UTC"));
        }

        Ok(())
    }
}
