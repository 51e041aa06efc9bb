//! Data models for the post analyzer.
//!
//! This module contains the core data structures shared by the analysis
//! runner, the session state machine and the report generator.

use crate::catalog::Category;
use crate::dataset::DatasetPreview;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Prefix stored in place of an answer when a question fails.
pub const QUESTION_ERROR_PREFIX: &str = "Error analyzing data";

/// Prefix stored in place of the summary when synthesis fails.
pub const SUMMARY_ERROR_PREFIX: &str = "Error generating summary";

/// Prefix stored in place of a follow-up answer when it fails.
pub const FOLLOWUP_ERROR_PREFIX: &str = "Error answering question";

/// Outcome of a single agent call, as stored in session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum Outcome {
    /// The agent's textual answer.
    Answer(String),
    /// A formatted error string kept in place of the answer.
    Error(String),
}

impl Outcome {
    /// Build an error outcome with the given prefix.
    pub fn failure(prefix: &str, error: impl fmt::Display) -> Self {
        Outcome::Error(format!("{}: {}", prefix, error))
    }

    /// The stored text, answers and errors alike.
    pub fn text(&self) -> &str {
        match self {
            Outcome::Answer(text) | Outcome::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Per-question results of the current epoch, keyed by question title.
///
/// Entries are only ever added. A title that already has an entry is
/// never recomputed within the epoch.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResults {
    entries: HashMap<String, Outcome>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, title: &str) -> Option<&Outcome> {
        self.entries.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.entries.contains_key(title)
    }

    /// Store an outcome unless the title already has one. Returns whether it was stored.
    pub fn record(&mut self, title: &str, outcome: Outcome) -> bool {
        if self.entries.contains_key(title) {
            return false;
        }
        self.entries.insert(title.to_string(), outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.values().filter(|o| o.is_error()).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stored outcomes of `category` in catalog order.
    pub fn in_catalog_order(&self, category: Category) -> Vec<(&'static str, &Outcome)> {
        category
            .questions()
            .iter()
            .filter_map(|q| self.entries.get(q.title).map(|o| (q.title, o)))
            .collect()
    }
}

/// Run state of the analysis state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Complete,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Complete => write!(f, "Complete"),
        }
    }
}

/// What a question panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum PanelStatus {
    Pending,
    Answer(String),
    Error(String),
}

impl From<Option<&Outcome>> for PanelStatus {
    fn from(outcome: Option<&Outcome>) -> Self {
        match outcome {
            None => PanelStatus::Pending,
            Some(Outcome::Answer(text)) => PanelStatus::Answer(text.clone()),
            Some(Outcome::Error(text)) => PanelStatus::Error(text.clone()),
        }
    }
}

/// One question panel: question text plus its current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    pub question: String,
    pub status: PanelStatus,
}

/// A free-form question asked after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub question: String,
    pub outcome: Outcome,
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Name of the LLM model used.
    pub model_used: String,
    /// State of the run when the report was taken.
    pub state: RunState,
    /// Number of questions answered successfully.
    pub answered: usize,
    /// Number of questions that stored an error.
    pub failed: usize,
}

/// The complete analysis report for one epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    /// Preview of the bound dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetPreview>,
    /// Selected category, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// One panel per question of the category.
    pub panels: Vec<Panel>,
    /// Synthesized summary, if the run completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Outcome>,
    /// Follow-up questions asked after the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followups: Vec<FollowUp>,
}
