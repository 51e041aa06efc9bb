//! Construction of dataset-bound chat agents.

use super::chat::{build_system_prompt, http_client, AgentSettings, ChatAgent};
use super::{Agent, AgentConfigError, AgentFactory};
use crate::dataset::Dataset;
use std::sync::Arc;
use tracing::debug;

/// Builds [`ChatAgent`]s for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiAgentFactory {
    settings: AgentSettings,
    /// Name of the environment variable the key was read from.
    credential_var: String,
    api_key: Option<String>,
}

impl OpenAiAgentFactory {
    pub fn new(settings: AgentSettings, credential_var: String, api_key: Option<String>) -> Self {
        Self {
            settings,
            credential_var,
            api_key,
        }
    }

    /// Read the credential from the named environment variable.
    pub fn from_env(settings: AgentSettings, credential_var: &str) -> Self {
        let api_key = std::env::var(credential_var).ok();
        Self::new(settings, credential_var.to_string(), api_key)
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Whether a non-blank credential is available.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn validate(&self) -> Result<&str, AgentConfigError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentConfigError::MissingCredential {
                var: self.credential_var.clone(),
            })?;

        if self.settings.model_name.trim().is_empty() {
            return Err(AgentConfigError::InvalidModel(
                "model name is empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.settings.temperature) {
            return Err(AgentConfigError::InvalidModel(format!(
                "temperature {} is outside 0.0-2.0",
                self.settings.temperature
            )));
        }
        if self.settings.timeout_seconds == 0 {
            return Err(AgentConfigError::InvalidModel(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        if self.settings.max_context_rows == 0 {
            return Err(AgentConfigError::InvalidModel(
                "max context rows must be at least 1".to_string(),
            ));
        }
        if !self.settings.api_url.starts_with("http://")
            && !self.settings.api_url.starts_with("https://")
        {
            return Err(AgentConfigError::InvalidModel(format!(
                "API URL must start with 'http://' or 'https://': {}",
                self.settings.api_url
            )));
        }

        Ok(key)
    }
}

impl AgentFactory for OpenAiAgentFactory {
    fn build(&self, dataset: &Arc<Dataset>) -> Result<Arc<dyn Agent>, AgentConfigError> {
        let key = self.validate()?.to_string();

        let client = http_client(self.settings.timeout_seconds)
            .map_err(|e| AgentConfigError::Client(e.to_string()))?;

        let context = dataset
            .to_csv_context(self.settings.max_context_rows)
            .map_err(|e| AgentConfigError::Context(e.to_string()))?;
        let system_prompt = build_system_prompt(dataset, &context);
        debug!(
            "System prompt for {} is {} chars",
            dataset.source(),
            system_prompt.len()
        );

        Ok(Arc::new(ChatAgent::new(
            self.settings.clone(),
            key,
            client,
            system_prompt,
        )))
    }
}
