//! Cold Case CLI
//!
//! Main entry point for the coldcase command-line tool.
//! Upload evidence files and ask questions answered only from them.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use coldcase_core::{config::AppConfig, logging};
use commands::{
    AskCommand, HistoryCommand, QuotaCommand, RebuildCommand, StatsCommand, UploadCommand,
};
use std::path::PathBuf;

/// Cold Case Detective - question answering grounded in uploaded evidence
#[derive(Parser, Debug)]
#[command(name = "coldcase")]
#[command(about = "Ask questions answered only from uploaded case evidence", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "COLDCASE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "COLDCASE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Completion provider (groq, openai, ollama)
    #[arg(short, long, global = true, env = "COLDCASE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "COLDCASE_MODEL")]
    model: Option<String>,

    /// User the question, quota and history belong to
    #[arg(short, long, global = true, env = "COLDCASE_USER", default_value = "detective")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy evidence files into the evidence folder and rebuild the index
    Upload(UploadCommand),

    /// Rebuild the index from the evidence folder
    Rebuild(RebuildCommand),

    /// Ask a question about the evidence
    Ask(AskCommand),

    /// Show the remaining daily questions
    Quota(QuotaCommand),

    /// Show or clear recent questions
    History(HistoryCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // The config file is merged inside load_from; CLI flags are applied last.
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())
        .context("Failed to load configuration")?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Cold Case CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_coldcase_dir()?;

    let command_name = match &cli.command {
        Commands::Upload(_) => "upload",
        Commands::Rebuild(_) => "rebuild",
        Commands::Ask(_) => "ask",
        Commands::Quota(_) => "quota",
        Commands::History(_) => "history",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name, user = %cli.user).entered();

    let result = match cli.command {
        Commands::Upload(cmd) => cmd.execute(&config),
        Commands::Rebuild(cmd) => cmd.execute(&config),
        Commands::Ask(cmd) => cmd.execute(&config, &cli.user).await,
        Commands::Quota(cmd) => cmd.execute(&config, &cli.user),
        Commands::History(cmd) => cmd.execute(&config, &cli.user),
        Commands::Stats(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
