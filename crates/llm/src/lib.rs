//! Completion service integration for the Cold Case engine.
//!
//! The engine only ever needs `complete(prompt) -> text`; this crate wraps
//! that contract in the `LlmClient` trait and provides the concrete clients.
//!
//! # Providers
//! - **Groq / OpenAI**: hosted `/chat/completions` APIs (default: Groq)
//! - **Ollama**: local runtime
//!
//! # Example
//! ```no_run
//! use coldcase_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None, None)?;
//! let request = LlmRequest::new("Summarize the case file.", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::ProviderType;
