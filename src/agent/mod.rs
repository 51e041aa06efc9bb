//! LLM agents that answer questions about a bound dataset.
//!
//! The rest of the application treats an agent as an opaque capability:
//! give it a natural-language question, get a natural-language answer or
//! an [`AgentError`]. [`AgentFactory`] builds agents bound to a dataset.

pub mod chat;
pub mod factory;

pub use chat::AgentSettings;
pub use factory::OpenAiAgentFactory;

use crate::dataset::Dataset;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single agent invocation.
///
/// These are never fatal to a run; callers store them as display text.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("failed to send request: {0}")]
    Request(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Failure to construct an agent. Fatal to the session until resolved.
#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("missing API credential: set the {var} environment variable")]
    MissingCredential { var: String },

    #[error("invalid model configuration: {0}")]
    InvalidModel(String),

    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("failed to prepare dataset context: {0}")]
    Context(String),
}

/// Something that can answer questions about a dataset.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Model identifier, for reports.
    fn model(&self) -> &str;

    /// Answer a natural-language question.
    async fn invoke(&self, question: &str) -> Result<String, AgentError>;
}

/// Builds agents bound to a dataset.
pub trait AgentFactory {
    fn build(&self, dataset: &Arc<Dataset>) -> Result<Arc<dyn Agent>, AgentConfigError>;
}
