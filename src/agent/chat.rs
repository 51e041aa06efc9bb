//! Chat-completions agent.
//!
//! Sends each question, together with the bound table rendered as CSV,
//! to an OpenAI-compatible `/chat/completions` endpoint.

use super::{Agent, AgentError};
use crate::dataset::Dataset;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Settings for a chat agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Base URL of the API, without the `/chat/completions` suffix.
    pub api_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Maximum number of data rows embedded in the prompt.
    pub max_context_rows: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_seconds: 300,
            max_context_rows: 500,
        }
    }
}

/// Chat message in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completions API request.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

/// Chat completions API response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_answer(self) -> Result<String, AgentError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Agent bound to one dataset, answering through a chat-completions API.
pub struct ChatAgent {
    settings: AgentSettings,
    api_key: String,
    http_client: reqwest::Client,
    system_prompt: String,
}

impl ChatAgent {
    pub(crate) fn new(
        settings: AgentSettings,
        api_key: String,
        http_client: reqwest::Client,
        system_prompt: String,
    ) -> Self {
        info!(
            "Initializing agent with model {} at {}",
            settings.model_name, settings.api_url
        );
        Self {
            settings,
            api_key,
            http_client,
            system_prompt,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        )
    }
}

/// Build the system prompt describing and embedding the table.
pub fn build_system_prompt(dataset: &Dataset, csv_context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are an expert social media analyst working with a table of post metrics.\n",
    );
    prompt.push_str(&format!(
        "The table comes from `{}` and has {} rows and {} columns: {}.\n",
        dataset.source(),
        dataset.row_count(),
        dataset.column_count(),
        dataset.columns().join(", ")
    ));
    prompt.push_str(
        "Answer every question using only this data. Compute figures from the rows, \
         name the columns you used, and say so when the data cannot answer the question.\n\n",
    );
    prompt.push_str("=== DATA (CSV) ===\n");
    prompt.push_str(csv_context);
    prompt.push_str("=== END OF DATA ===\n");
    prompt
}

#[async_trait]
impl Agent for ChatAgent {
    fn model(&self) -> &str {
        &self.settings.model_name
    }

    async fn invoke(&self, question: &str) -> Result<String, AgentError> {
        let request = ChatCompletionRequest {
            model: &self.settings.model_name,
            messages: vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user(question),
            ],
            temperature: self.settings.temperature,
        };

        debug!("Sending question ({} chars) to {}", question.len(), self.endpoint());

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.settings.timeout_seconds)
                } else if e.is_connect() {
                    AgentError::Connect(self.settings.api_url.clone())
                } else {
                    AgentError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if e.is_timeout() => {
                    return Err(AgentError::Timeout(self.settings.timeout_seconds))
                }
                Err(_) => String::new(),
            };
            return Err(AgentError::Api { status, body });
        }

        // The client timeout also covers reading the body
        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.settings.timeout_seconds)
            } else {
                AgentError::Decode(e.to_string())
            }
        })?;

        completion.into_answer()
    }
}

/// Build the HTTP client used by chat agents.
pub(crate) fn http_client(timeout_seconds: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
}
