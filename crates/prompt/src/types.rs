//! Prompt types for the grounding prompt.

use serde::{Deserialize, Serialize};

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Handlebars template; receives `question` and `evidence` (list of `{source, content}`)
    pub template: String,

    /// Generation settings sent along with the rendered prompt
    #[serde(default)]
    pub output: PromptOutputSpec,
}

/// Generation settings for the completion request.
///
/// Unset fields leave the provider's own defaults in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Upper bound on generated tokens
    #[serde(rename = "maxTokens", default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// System message sent ahead of the prompt
    #[serde(default)]
    pub system: Option<String>,
}

/// One block of evidence injected into the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBlock {
    /// Source file name shown to the model for citation
    pub source: String,

    /// Excerpt text
    pub content: String,
}

/// A fully rendered prompt, sent to the completion service as one string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub text: String,

    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of evidence blocks rendered
    #[serde(rename = "evidenceCount")]
    pub evidence_count: usize,
}
