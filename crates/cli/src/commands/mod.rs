//! Command handlers for the Cold Case CLI.

pub mod ask;
pub mod evidence;
pub mod history;
pub mod quota;
pub mod stats;

pub use ask::AskCommand;
pub use evidence::{RebuildCommand, UploadCommand};
pub use history::HistoryCommand;
pub use quota::QuotaCommand;
pub use stats::StatsCommand;
