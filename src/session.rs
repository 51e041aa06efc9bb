//! Per-session analysis state machine.
//!
//! A [`Session`] owns everything one user works with: the bound dataset and
//! agent, the selected category, and the results of the current epoch. It
//! is driven by discrete [`SessionEvent`]s:
//!
//! ```text
//!   Idle --start--> Running --all questions + summary--> Complete
//!    ^                                                      |
//!    +------------ select other category / new dataset -----+
//! ```
//!
//! A start in `Running` or `Complete` is a no-op. Within an epoch each
//! question title is sent to the agent at most once.

use crate::agent::{Agent, AgentConfigError, AgentFactory};
use crate::analysis::{answer_questions, synthesize_summary, RunObserver};
use crate::catalog::Category;
use crate::dataset::{Dataset, DatasetLoader, DatasetPreview, LoadError, PREVIEW_ROWS};
use crate::models::{
    AnalysisResults, FollowUp, Outcome, Panel, PanelStatus, ReportMetadata, RunReport, RunState,
    FOLLOWUP_ERROR_PREFIX,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop an event from taking effect.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no dataset loaded")]
    NoDataset,

    #[error("no analysis category selected")]
    NoCategory,

    #[error("agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    AgentConfig(#[from] AgentConfigError),
}

/// Discrete user events.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Upload(PathBuf),
    SelectCategory(Category),
    Start,
    Ask(String),
}

/// Result of a start event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The run went through every question and the summary.
    Completed { invoked: usize },
    /// A run already happened this epoch; nothing was done.
    AlreadyStarted(RunState),
}

/// What an event changed.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Loaded(DatasetPreview),
    CategorySelected { changed: bool },
    Started(StartOutcome),
    Answered(Outcome),
}

/// Explicit per-session context.
pub struct Session<F: AgentFactory> {
    factory: F,
    loader: DatasetLoader,
    dataset: Option<Arc<Dataset>>,
    agent: Option<Arc<dyn Agent>>,
    /// Why the last agent construction failed, if it did.
    agent_error: Option<String>,
    category: Option<Category>,
    state: RunState,
    results: AnalysisResults,
    summary: Option<Outcome>,
    followups: Vec<FollowUp>,
    epoch: u64,
}

impl<F: AgentFactory> Session<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            loader: DatasetLoader::new(),
            dataset: None,
            agent: None,
            agent_error: None,
            category: None,
            state: RunState::Idle,
            results: AnalysisResults::new(),
            summary: None,
            followups: Vec::new(),
            epoch: 0,
        }
    }

    /// Dispatch one event.
    pub async fn handle(
        &mut self,
        event: SessionEvent,
        observer: &mut dyn RunObserver,
    ) -> Result<EventOutcome, SessionError> {
        debug!("Session event: {:?}", event);
        match event {
            SessionEvent::Upload(path) => self.upload(&path).map(EventOutcome::Loaded),
            SessionEvent::SelectCategory(category) => Ok(EventOutcome::CategorySelected {
                changed: self.select_category(category),
            }),
            SessionEvent::Start => self.start(observer).await.map(EventOutcome::Started),
            SessionEvent::Ask(question) => self.ask(&question).await.map(EventOutcome::Answered),
        }
    }

    /// Load a CSV file and bind it, building an agent for it.
    pub fn upload(&mut self, path: &std::path::Path) -> Result<DatasetPreview, SessionError> {
        let dataset = self.loader.load_path(path)?;
        debug!("{} dataset(s) cached", self.loader.cached());
        self.bind_dataset(dataset)
    }

    /// Load CSV content and bind it, building an agent for it.
    pub fn upload_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<DatasetPreview, SessionError> {
        let dataset = self.loader.load_bytes(name, bytes)?;
        self.bind_dataset(dataset)
    }

    fn bind_dataset(&mut self, dataset: Arc<Dataset>) -> Result<DatasetPreview, SessionError> {
        let preview = dataset.preview(PREVIEW_ROWS);
        let same = self
            .dataset
            .as_ref()
            .is_some_and(|d| d.fingerprint() == dataset.fingerprint());

        if same && self.agent.is_some() {
            debug!("Dataset {} already bound", dataset.source());
            return Ok(preview);
        }

        if !same {
            if self.dataset.is_some() {
                info!("New dataset {}; starting a new epoch", dataset.source());
                self.reset_epoch();
            }
            self.agent = None;
            self.dataset = Some(Arc::clone(&dataset));
        }

        match self.factory.build(&dataset) {
            Ok(agent) => {
                info!("Agent ready ({})", agent.model());
                self.agent = Some(agent);
                self.agent_error = None;
                Ok(preview)
            }
            Err(e) => {
                warn!("Agent construction failed: {}", e);
                self.agent_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Select a category. Returns whether this started a new epoch.
    pub fn select_category(&mut self, category: Category) -> bool {
        if self.category == Some(category) {
            return false;
        }
        info!("Category selected: {}", category);
        self.reset_epoch();
        self.category = Some(category);
        true
    }

    fn reset_epoch(&mut self) {
        self.results.clear();
        self.summary = None;
        self.followups.clear();
        self.state = RunState::Idle;
        self.epoch += 1;
    }

    /// Run the analysis for the selected category.
    pub async fn start(
        &mut self,
        observer: &mut dyn RunObserver,
    ) -> Result<StartOutcome, SessionError> {
        if self.state != RunState::Idle {
            debug!("Start ignored in state {}", self.state);
            return Ok(StartOutcome::AlreadyStarted(self.state));
        }

        let category = self.category.ok_or(SessionError::NoCategory)?;
        if self.dataset.is_none() {
            return Err(SessionError::NoDataset);
        }
        let agent = self.bound_agent()?;

        info!("Starting analysis: {}", category);
        self.state = RunState::Running;

        let invoked = answer_questions(agent.as_ref(), category, &mut self.results, observer).await;
        let summary = synthesize_summary(agent.as_ref(), category, &self.results, observer).await;

        self.summary = Some(summary);
        self.state = RunState::Complete;
        info!(
            "Analysis complete: {} answered, {} failed",
            self.results.len() - self.results.error_count(),
            self.results.error_count()
        );

        Ok(StartOutcome::Completed { invoked })
    }

    /// Ask a free-form question, with the current results as context.
    pub async fn ask(&mut self, question: &str) -> Result<Outcome, SessionError> {
        let agent = self.bound_agent()?;
        let prompt = self.followup_prompt(question);

        let outcome = match agent.invoke(&prompt).await {
            Ok(answer) => Outcome::Answer(answer),
            Err(e) => {
                warn!("Follow-up failed: {}", e);
                Outcome::failure(FOLLOWUP_ERROR_PREFIX, e)
            }
        };

        self.followups.push(FollowUp {
            question: question.to_string(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn followup_prompt(&self, question: &str) -> String {
        let mut context = String::new();
        if let Some(category) = self.category {
            for (title, outcome) in self.results.in_catalog_order(category) {
                context.push_str(&format!("{}: {}\n", title, outcome.text()));
            }
        }
        if context.is_empty() {
            context.push_str("(none yet)\n");
        }

        format!(
            "Context: you are analyzing social media post data. Previous analysis:\n{}\nQuestion: {}\n\nPlease provide a concise, data-backed response.",
            context, question
        )
    }

    fn bound_agent(&self) -> Result<Arc<dyn Agent>, SessionError> {
        if self.dataset.is_none() {
            return Err(SessionError::NoDataset);
        }
        self.agent.clone().ok_or_else(|| {
            SessionError::AgentUnavailable(
                self.agent_error
                    .clone()
                    .unwrap_or_else(|| "no agent bound".to_string()),
            )
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn results(&self) -> &AnalysisResults {
        &self.results
    }

    pub fn summary(&self) -> Option<&Outcome> {
        self.summary.as_ref()
    }

    pub fn followups(&self) -> &[FollowUp] {
        &self.followups
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn agent_error(&self) -> Option<&str> {
        self.agent_error.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// One panel per question of the selected category.
    pub fn panels(&self) -> Vec<Panel> {
        let Some(category) = self.category else {
            return Vec::new();
        };

        category
            .questions()
            .iter()
            .map(|q| Panel {
                title: q.title.to_string(),
                question: q.text.to_string(),
                status: PanelStatus::from(self.results.get(q.title)),
            })
            .collect()
    }

    /// Snapshot of the current epoch for reporting.
    pub fn report(&self) -> RunReport {
        let failed = self.results.error_count();
        RunReport {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                model_used: self
                    .agent
                    .as_ref()
                    .map(|a| a.model().to_string())
                    .unwrap_or_else(|| "(none)".to_string()),
                state: self.state,
                answered: self.results.len() - failed,
                failed,
            },
            dataset: self.dataset.as_ref().map(|d| d.preview(PREVIEW_ROWS)),
            category: self.category,
            panels: self.panels(),
            summary: self.summary.clone(),
            followups: self.followups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{ScriptedAgent, ScriptedFactory};
    use crate::analysis::NoopObserver;

    const SAMPLE: &[u8] = include_bytes!("../fixtures/posts_sample.csv");
    const HEADER_ONLY: &[u8] = include_bytes!("../fixtures/header_only.csv");

    fn ready_session(agent: ScriptedAgent, category: Category) -> Session<ScriptedFactory> {
        let mut session = Session::new(ScriptedFactory::new(agent));
        session.upload_bytes("posts.csv", SAMPLE).unwrap();
        session.select_category(category);
        session
    }

    #[tokio::test]
    async fn test_awareness_run_completes() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);

        let outcome = session.start(&mut NoopObserver).await.unwrap();

        assert_eq!(outcome, StartOutcome::Completed { invoked: 3 });
        assert_eq!(session.state(), RunState::Complete);
        assert_eq!(session.results().len(), 3);
        assert_eq!(session.results().error_count(), 0);
        let summary = session.summary().unwrap();
        assert!(!summary.is_error());
        assert!(!summary.text().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_start_never_reinvokes() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Engagement);

        session.start(&mut NoopObserver).await.unwrap();
        let second = session.start(&mut NoopObserver).await.unwrap();

        assert_eq!(second, StartOutcome::AlreadyStarted(RunState::Complete));
        let agent = &session.factory.agent;
        for question in Category::Engagement.questions() {
            assert_eq!(agent.calls_for(question.text), 1, "{}", question.title);
        }
        // Three questions plus one summary.
        assert_eq!(agent.calls(), 4);
    }

    #[tokio::test]
    async fn test_category_change_clears_results_and_summary() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);
        session.start(&mut NoopObserver).await.unwrap();
        session.ask("Which day is best?").await.unwrap();
        let epoch = session.epoch();

        assert!(session.select_category(Category::Conversions));

        assert!(session.results().is_empty());
        assert!(session.summary().is_none());
        assert!(session.followups().is_empty());
        assert_eq!(session.state(), RunState::Idle);
        assert_eq!(session.epoch(), epoch + 1);
        assert!(session
            .panels()
            .iter()
            .all(|p| p.status == PanelStatus::Pending));
    }

    #[tokio::test]
    async fn test_reselecting_same_category_keeps_epoch() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);
        session.start(&mut NoopObserver).await.unwrap();

        assert!(!session.select_category(Category::Awareness));
        assert_eq!(session.results().len(), 3);
        assert_eq!(session.state(), RunState::Complete);
    }

    #[tokio::test]
    async fn test_new_category_runs_fresh_epoch() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);
        session.start(&mut NoopObserver).await.unwrap();

        session.select_category(Category::Engagement);
        let outcome = session.start(&mut NoopObserver).await.unwrap();

        assert_eq!(outcome, StartOutcome::Completed { invoked: 3 });
        let titles: Vec<_> = session
            .panels()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(
            titles,
            vec!["Engagement Rates", "Top Engaging Posts", "Engagement Trends"]
        );
        assert!(session.results().get("Average Reach by Type").is_none());
    }

    #[tokio::test]
    async fn test_one_failure_keeps_all_entries_and_summary() {
        let failing = "How does promoted content perform";
        let mut session = ready_session(
            ScriptedAgent::new().failing_on(failing),
            Category::Awareness,
        );

        session.start(&mut NoopObserver).await.unwrap();

        let results = session.results();
        assert_eq!(results.len(), 3);
        assert_eq!(results.error_count(), 1);
        let error_text = results.get("Promoted vs Organic").unwrap().text().to_string();
        assert!(error_text.starts_with("Error analyzing data: "));

        let prompts = session.factory.agent.prompts();
        let summary_prompt = prompts.last().unwrap();
        assert!(summary_prompt.starts_with("Here are the analysis results:"));
        assert!(summary_prompt.contains(&error_text));
        for (_, outcome) in results.in_catalog_order(Category::Awareness) {
            assert!(summary_prompt.contains(outcome.text()));
        }
        assert_eq!(session.state(), RunState::Complete);
    }

    #[tokio::test]
    async fn test_summary_failure_still_completes() {
        let mut session = ready_session(
            ScriptedAgent::new().failing_on("Here are the analysis results"),
            Category::Conversions,
        );

        session.start(&mut NoopObserver).await.unwrap();

        assert_eq!(session.state(), RunState::Complete);
        let summary = session.summary().unwrap();
        assert!(summary.text().starts_with("Error generating summary: "));
    }

    #[test]
    fn test_empty_file_fails_before_agent_construction() {
        let mut session = Session::new(ScriptedFactory::new(ScriptedAgent::new()));

        let err = session.upload_bytes("empty.csv", HEADER_ONLY).unwrap_err();

        assert!(matches!(err, SessionError::Load(LoadError::Empty { .. })));
        assert_eq!(session.factory.builds(), 0);
        assert!(session.dataset().is_none());
    }

    #[test]
    fn test_same_bytes_twice_builds_agent_once() {
        let mut session = Session::new(ScriptedFactory::new(ScriptedAgent::new()));

        let first = session.upload_bytes("posts.csv", SAMPLE).unwrap();
        let second = session.upload_bytes("posts_copy.csv", SAMPLE).unwrap();

        assert_eq!(first.row_count, second.row_count);
        assert_eq!(first.column_count, second.column_count);
        assert_eq!(session.factory.builds(), 1);
    }

    #[test]
    fn test_missing_credential_halts_session() {
        tokio_test::block_on(async {
            let mut session = Session::new(ScriptedFactory::without_credential());

            let err = session.upload_bytes("posts.csv", SAMPLE).unwrap_err();
            assert!(matches!(
                err,
                SessionError::AgentConfig(AgentConfigError::MissingCredential { .. })
            ));
            assert!(session.agent_error().is_some());

            session.select_category(Category::Awareness);
            let err = session.start(&mut NoopObserver).await.unwrap_err();
            assert!(matches!(err, SessionError::AgentUnavailable(_)));

            assert_eq!(session.state(), RunState::Idle);
            let panels = session.panels();
            assert_eq!(panels.len(), 3);
            assert!(panels.iter().all(|p| p.status == PanelStatus::Pending));
            assert!(session.summary().is_none());
        });
    }

    #[tokio::test]
    async fn test_start_guards() {
        let mut session = Session::new(ScriptedFactory::new(ScriptedAgent::new()));
        assert!(matches!(
            session.start(&mut NoopObserver).await,
            Err(SessionError::NoCategory)
        ));

        session.select_category(Category::Awareness);
        assert!(matches!(
            session.start(&mut NoopObserver).await,
            Err(SessionError::NoDataset)
        ));
        assert_eq!(session.factory.agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_new_dataset_starts_new_epoch() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);
        session.start(&mut NoopObserver).await.unwrap();

        session
            .upload_bytes("other.csv", b"post_type,reach\nReel,10\n")
            .unwrap();

        assert!(session.results().is_empty());
        assert_eq!(session.state(), RunState::Idle);
        assert_eq!(session.category(), Some(Category::Awareness));
        assert_eq!(session.factory.builds(), 2);
    }

    #[tokio::test]
    async fn test_ask_uses_results_as_context() {
        let mut session = ready_session(ScriptedAgent::new(), Category::Awareness);
        session.start(&mut NoopObserver).await.unwrap();

        let outcome = session.ask("Should we post more reels?").await.unwrap();

        assert!(!outcome.is_error());
        assert_eq!(session.followups().len(), 1);
        let prompt = session.factory.agent.prompts().pop().unwrap();
        assert!(prompt.contains("Average Reach by Type: Answer to:"));
        assert!(prompt.contains("Question: Should we post more reels?"));
    }

    #[tokio::test]
    async fn test_handle_dispatches_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut session = Session::new(ScriptedFactory::new(ScriptedAgent::new()));
        let mut observer = NoopObserver;

        match session
            .handle(SessionEvent::Upload(path), &mut observer)
            .await
            .unwrap()
        {
            EventOutcome::Loaded(preview) => assert_eq!(preview.row_count, 12),
            other => panic!("unexpected outcome: {other:?}"),
        }

        session
            .handle(SessionEvent::SelectCategory(Category::Awareness), &mut observer)
            .await
            .unwrap();

        match session
            .handle(SessionEvent::Start, &mut observer)
            .await
            .unwrap()
        {
            EventOutcome::Started(StartOutcome::Completed { invoked }) => assert_eq!(invoked, 3),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let report = session.report();
        assert_eq!(report.metadata.answered, 3);
        assert_eq!(report.metadata.model_used, "scripted");
        assert_eq!(report.metadata.state, RunState::Complete);
    }
}
