//! Prompt system for the Cold Case engine.
//!
//! - YAML prompt definitions with a built-in grounded answer prompt
//! - Handlebars rendering of question + evidence blocks into one prompt

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_grounded_prompt;
pub use loader::{builtin_prompt, load_prompt, ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, EvidenceBlock, PromptDefinition, PromptOutputSpec};
