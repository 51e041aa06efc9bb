//! Test doubles for agents and agent factories.

use crate::agent::{Agent, AgentConfigError, AgentError, AgentFactory};
use crate::dataset::Dataset;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Agent that answers deterministically and records every prompt.
#[derive(Default)]
pub struct ScriptedAgent {
    prompts: Mutex<Vec<String>>,
    fail_on: Vec<String>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any prompt containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Number of prompts exactly equal to `prompt`.
    pub fn calls_for(&self, prompt: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == prompt)
            .count()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, question: &str) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(question.to_string());

        if self.fail_on.iter().any(|n| question.contains(n.as_str())) {
            return Err(AgentError::Api {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }

        let head: String = question.chars().take(40).collect();
        Ok(format!("Answer to: {}", head))
    }
}

/// Factory handing out a shared [`ScriptedAgent`] and counting builds.
pub struct ScriptedFactory {
    pub agent: Arc<ScriptedAgent>,
    builds: AtomicUsize,
    missing_credential: bool,
}

impl ScriptedFactory {
    pub fn new(agent: ScriptedAgent) -> Self {
        Self {
            agent: Arc::new(agent),
            builds: AtomicUsize::new(0),
            missing_credential: false,
        }
    }

    /// A factory whose every build fails for lack of a credential.
    pub fn without_credential() -> Self {
        Self {
            missing_credential: true,
            ..Self::new(ScriptedAgent::new())
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl AgentFactory for ScriptedFactory {
    fn build(&self, _dataset: &Arc<Dataset>) -> Result<Arc<dyn Agent>, AgentConfigError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.missing_credential {
            return Err(AgentConfigError::MissingCredential {
                var: "OPENAI_API_KEY".to_string(),
            });
        }
        let agent: Arc<dyn Agent> = self.agent.clone();
        Ok(agent)
    }
}
