//! Prompt builder: renders the grounding template with the question and evidence.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, EvidenceBlock, PromptDefinition};
use coldcase_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Build the single grounded prompt for a question.
///
/// The template receives `question` and `evidence`, the latter in retrieval
/// order so the most relevant excerpt is read first.
///
/// # Example
/// ```no_run
/// use coldcase_prompt::{build_grounded_prompt, builtin_prompt, EvidenceBlock, ANSWER_PROMPT_ID};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
/// let evidence = vec![EvidenceBlock {
///     source: "case1.txt".to_string(),
///     content: "The suspect wore a red jacket.".to_string(),
/// }];
/// let built = build_grounded_prompt(&def, "What did the suspect wear?", &evidence)?;
/// println!("{}", built.text);
/// # Ok(())
/// # }
/// ```
pub fn build_grounded_prompt(
    definition: &PromptDefinition,
    question: &str,
    evidence: &[EvidenceBlock],
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt = %definition.id,
        blocks = evidence.len(),
        "Building grounded prompt"
    );

    let data = serde_json::json!({
        "question": question,
        "evidence": evidence,
    });

    let text = render_template(&definition.template, &data)?;

    Ok(BuiltPrompt {
        text,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            evidence_count: evidence.len(),
        },
    })
}

/// Render a Handlebars template with plain-text (unescaped) output.
fn render_template<T: Serialize>(template: &str, data: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
