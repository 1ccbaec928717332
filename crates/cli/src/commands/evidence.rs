//! Upload and rebuild command handlers.

use clap::Args;
use coldcase_core::{config::AppConfig, AppError, AppResult};
use coldcase_evidence::{EvidenceEngine, RebuildStats};
use std::path::PathBuf;

/// Copy evidence files into the evidence folder
#[derive(Args, Debug)]
pub struct UploadCommand {
    /// Files to upload (.txt or .pdf)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl UploadCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing upload command for {} files", self.files.len());

        let engine = EvidenceEngine::open(config, None)?;
        let mut reports = Vec::with_capacity(self.files.len());

        for path in &self.files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| AppError::unreadable(path, "not a file"))?;
            let bytes = std::fs::read(path).map_err(|e| AppError::unreadable(path, e))?;

            let report = engine.upload(&name, &bytes)?;
            if !self.json {
                println!("Uploaded {}", report.file_name);
            }
            reports.push(report);
        }

        let Some(last) = reports.last() else {
            return Ok(());
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            print_rebuild(&last.rebuild);
        }

        Ok(())
    }
}

/// Rebuild the index from the evidence folder
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RebuildCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rebuild command");

        let engine = EvidenceEngine::open(config, None)?;
        let stats = engine.rebuild()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print_rebuild(&stats);
        }

        Ok(())
    }
}

fn print_rebuild(stats: &RebuildStats) {
    println!(
        "Indexed {} documents (generation {}) in {:.2}s",
        stats.indexed, stats.generation, stats.duration_secs
    );
    if stats.skipped_empty + stats.skipped_unreadable + stats.ignored > 0 {
        println!(
            "Skipped: {} empty, {} unreadable, {} unsupported",
            stats.skipped_empty, stats.skipped_unreadable, stats.ignored
        );
    }
}
