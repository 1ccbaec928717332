//! Answer composition.
//!
//! Renders the grounding prompt from the retrieved excerpts, makes exactly
//! one completion call and returns the model's text verbatim together with
//! the sources it was shown.

use crate::types::{ComposedAnswer, RetrievedChunk};
use coldcase_core::{AppError, AppResult};
use coldcase_llm::{LlmClient, LlmRequest};
use coldcase_prompt::{build_grounded_prompt, EvidenceBlock, PromptDefinition};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Returned when nothing was retrieved. No completion call is made.
pub const NO_EVIDENCE_ANSWER: &str = "No evidence uploaded yet.";

/// Composes answers; the completion client is optional so an engine can be
/// opened for indexing and housekeeping without provider credentials.
pub struct AnswerComposer {
    client: Option<Arc<dyn LlmClient>>,
    model: String,
    prompt: PromptDefinition,
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("provider", &self.client.as_ref().map(|c| c.provider_name()))
            .field("model", &self.model)
            .field("prompt", &self.prompt.id)
            .finish()
    }
}

impl AnswerComposer {
    pub fn new(
        client: Option<Arc<dyn LlmClient>>,
        model: impl Into<String>,
        prompt: PromptDefinition,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    pub async fn compose(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> AppResult<ComposedAnswer> {
        if chunks.is_empty() {
            tracing::info!("No evidence retrieved, skipping completion");
            return Ok(ComposedAnswer {
                answer: NO_EVIDENCE_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let evidence: Vec<EvidenceBlock> = chunks
            .iter()
            .map(|c| EvidenceBlock {
                source: c.source.clone(),
                content: c.content.clone(),
            })
            .collect();

        let client = self.client.as_ref().ok_or_else(|| {
            AppError::Config("No completion provider configured".to_string())
        })?;

        let built = build_grounded_prompt(&self.prompt, question, &evidence)?;
        tracing::debug!(
            "Prompt '{}' rendered: {} chars, {} evidence blocks",
            built.metadata.source_prompt_id,
            built.text.len(),
            built.metadata.evidence_count
        );

        let output = &self.prompt.output;
        let mut request = LlmRequest::new(built.text, self.model.clone());
        if let Some(max_tokens) = output.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = output.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(ref system) = output.system {
            request = request.with_system(system.clone());
        }
        let response = client.complete(&request).await?;

        tracing::info!(
            "Answer received from {} ({} tokens)",
            client.provider_name(),
            response.usage.total_tokens
        );

        Ok(ComposedAnswer {
            answer: response.content,
            citations: citations_for(chunks),
        })
    }
}

/// Distinct chunk sources, sorted.
pub fn citations_for(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks
        .iter()
        .map(|c| c.source.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::MockClient;
    use coldcase_prompt::{builtin_prompt, ANSWER_PROMPT_ID};

    fn composer(client: Arc<MockClient>) -> AnswerComposer {
        AnswerComposer::new(
            Some(client as Arc<dyn LlmClient>),
            "test-model",
            builtin_prompt(ANSWER_PROMPT_ID).unwrap(),
        )
    }

    fn chunk(source: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: source.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_chunks_short_circuits() {
        let client = Arc::new(MockClient::answering("should not be used"));
        let answer = composer(client.clone())
            .compose("Who did it?", &[])
            .await
            .unwrap();

        assert_eq!(answer.answer, NO_EVIDENCE_ANSWER);
        assert!(answer.citations.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_contains_evidence_and_question() {
        let client = Arc::new(MockClient::answering("According to [case1.txt], red."));
        let answer = composer(client.clone())
            .compose(
                "What did the suspect wear?",
                &[chunk("case1.txt", "The suspect wore a red jacket.")],
            )
            .await
            .unwrap();

        assert_eq!(answer.answer, "According to [case1.txt], red.");
        assert_eq!(answer.citations, vec!["case1.txt"]);
        assert_eq!(client.calls(), 1);

        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("Evidence from case1.txt"));
        assert!(prompt.contains("The suspect wore a red jacket."));
        assert!(prompt.contains("What did the suspect wear?"));
    }

    #[tokio::test]
    async fn test_output_settings_reach_the_request() {
        let client = Arc::new(MockClient::answering("ok"));
        let mut prompt = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
        prompt.output.max_tokens = Some(200);
        prompt.output.temperature = Some(0.0);
        prompt.output.system = Some("Stay on the case file.".to_string());
        let composer = AnswerComposer::new(
            Some(client.clone() as Arc<dyn LlmClient>),
            "test-model",
            prompt,
        );

        composer
            .compose("Who?", &[chunk("case1.txt", "The butler.")])
            .await
            .unwrap();

        let request = client.last_request().unwrap();
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, Some(200));
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.system.as_deref(), Some("Stay on the case file."));
    }

    #[tokio::test]
    async fn test_builtin_prompt_sends_a_bare_request() {
        let client = Arc::new(MockClient::answering("ok"));
        composer(client.clone())
            .compose("Who?", &[chunk("case1.txt", "The butler.")])
            .await
            .unwrap();

        let request = client.last_request().unwrap();
        assert!(request.max_tokens.is_none());
        assert!(request.temperature.is_none());
        assert!(request.system.is_none());
    }

    #[tokio::test]
    async fn test_citations_are_deduplicated() {
        let chunks = [
            chunk("b.txt", "one"),
            chunk("a.txt", "two"),
            chunk("b.txt", "three"),
        ];
        assert_eq!(citations_for(&chunks), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_missing_client_is_config_error() {
        let composer = AnswerComposer::new(None, "m", builtin_prompt(ANSWER_PROMPT_ID).unwrap());

        let sentinel = composer.compose("q", &[]).await.unwrap();
        assert_eq!(sentinel.answer, NO_EVIDENCE_ANSWER);

        let err = composer.compose("q", &[chunk("a.txt", "x")]).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let client = Arc::new(MockClient::failing());
        let err = composer(client)
            .compose("q", &[chunk("a.txt", "text")])
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
