//! Ask command handler.
//!
//! Answers a question from the uploaded evidence, charging the user's
//! daily quota.

use clap::Args;
use coldcase_core::{config::AppConfig, AppError, AppResult};
use coldcase_evidence::{connect_client, EvidenceEngine};

/// Ask a question about the evidence
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Print the excerpts the answer was based on
    #[arg(long)]
    pub show_evidence: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig, user: &str) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        if self.question.trim().is_empty() {
            return Err(AppError::Config("Question must not be empty".to_string()));
        }

        config.validate()?;
        let client = connect_client(config)?;
        let engine = EvidenceEngine::open(config, Some(client))?;

        // A daily limit denial surfaces once, through the returned error.
        let outcome = engine.ask(user, &self.question).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        println!("{}", outcome.answer);

        if !outcome.citations.is_empty() {
            println!();
            println!("Sources:");
            for source in &outcome.citations {
                println!("- {}", source);
            }
        }

        if self.show_evidence {
            for chunk in &outcome.chunks {
                println!();
                println!("--- {} ---", chunk.source);
                println!("{}", chunk.content);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldcase_evidence::config::save_config;
    use coldcase_evidence::EngineConfig;
    use tempfile::TempDir;

    fn ollama_config(workspace: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.workspace = workspace.path().to_path_buf();
        config.provider = "ollama".to_string();
        config.model = "llama3.2".to_string();
        config
    }

    #[tokio::test]
    async fn test_daily_limit_returns_denial_error() {
        let temp = TempDir::new().unwrap();
        let config = ollama_config(&temp);
        config.ensure_coldcase_dir().unwrap();
        let engine_config = EngineConfig {
            daily_limit: 0,
            ..EngineConfig::default()
        };
        save_config(temp.path(), &engine_config).unwrap();

        let cmd = AskCommand {
            question: "Who was at the docks?".to_string(),
            show_evidence: false,
            json: false,
        };
        let err = cmd.execute(&config, "detective").await.unwrap_err();
        assert!(err.is_quota_denial());
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let temp = TempDir::new().unwrap();
        let cmd = AskCommand {
            question: "   ".to_string(),
            show_evidence: false,
            json: false,
        };
        let err = cmd
            .execute(&ollama_config(&temp), "detective")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
