//! Prompt loader.
//!
//! A workspace may override a prompt by dropping `<id>.yml` into
//! `.coldcase/prompts/`. Without an override the built-in definition is used.

use crate::types::{PromptDefinition, PromptOutputSpec};
use coldcase_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the grounded answer prompt.
pub const ANSWER_PROMPT_ID: &str = "evidence.answer";

const ANSWER_TEMPLATE: &str = "You are a Cold Case Detective AI.
Answer ONLY using the evidence below.

{{#each evidence}}
Evidence from {{this.source}}:
{{this.content}}

{{/each}}
Question: {{question}}

Rules:
- Always cite sources like: According to [source]...
- If the evidence does not answer the question, say so clearly.
";

/// The built-in definition for `id`, if there is one.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Grounded evidence answer".to_string(),
            api_version: "1.0".to_string(),
            created_by: "builtin".to_string(),
            template: ANSWER_TEMPLATE.to_string(),
            output: PromptOutputSpec::default(),
        }),
        _ => None,
    }
}

/// Load a prompt definition by ID, preferring the workspace override.
///
/// # Example
/// ```no_run
/// use coldcase_prompt::{load_prompt, ANSWER_PROMPT_ID};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), ANSWER_PROMPT_ID)?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".coldcase/prompts")
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        tracing::debug!("No prompt override at {:?}, using built-in", prompt_file);
        return builtin_prompt(prompt_id).ok_or_else(|| {
            AppError::Prompt(format!("Prompt file not found: {:?}", prompt_file))
        });
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    // A template that never shows the question cannot ground an answer.
    if !def.template.contains("question") {
        return Err(AppError::Prompt(format!(
            "Prompt template for {} does not reference {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}
