//! Stats command handler.

use clap::Args;
use coldcase_core::{config::AppConfig, AppResult};
use coldcase_evidence::{EvidenceEngine, IndexState};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// List indexed file names
    #[arg(short, long)]
    pub detailed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let engine = EvidenceEngine::open(config, None)?;
        let stats = engine.index_stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Evidence folder: {}", engine.evidence_dir().display());
        match stats.state {
            IndexState::Absent => println!("Index: not built"),
            IndexState::Empty => println!("Index: empty (no readable evidence)"),
            IndexState::Built => println!(
                "Index: {} documents, {} terms",
                stats.documents, stats.vocabulary
            ),
        }
        if let Some(built_at) = stats.built_at {
            println!("Built at: {}", built_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        if self.detailed {
            for source in &stats.sources {
                println!("- {}", source);
            }
        }

        Ok(())
    }
}
