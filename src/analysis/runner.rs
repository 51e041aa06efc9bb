//! Per-category analysis run.
//!
//! Asks the agent every question of a category in catalog order, storing
//! each answer (or error text) under the question title, then asks once
//! more for a summary of everything stored.

use crate::agent::Agent;
use crate::catalog::{Category, Question};
use crate::models::{AnalysisResults, Outcome, QUESTION_ERROR_PREFIX, SUMMARY_ERROR_PREFIX};
use tracing::{debug, info, warn};

/// Instruction appended to the collected results for the summary call.
pub const SUMMARY_INSTRUCTION: &str = "Based on the analysis results above, what are the 3-5 most interesting and actionable conclusions?\nFormat the response as bullet points. Focus on insights that could improve content strategy.";

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    QuestionStarted {
        index: usize,
        total: usize,
        question: &'a Question,
    },
    /// The title already had a stored result this epoch.
    QuestionSkipped { question: &'a Question },
    QuestionFinished {
        question: &'a Question,
        outcome: &'a Outcome,
    },
    SummaryStarted,
    SummaryFinished { outcome: &'a Outcome },
}

/// Receives [`RunEvent`]s as a run progresses.
pub trait RunObserver {
    fn on_event(&mut self, event: RunEvent<'_>);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&mut self, _event: RunEvent<'_>) {}
}

/// Ask every unanswered question of `category`. Returns the number of agent calls made.
///
/// Titles that already hold a result are skipped. Agent failures are stored
/// as error text and the loop moves on.
pub async fn answer_questions(
    agent: &dyn Agent,
    category: Category,
    results: &mut AnalysisResults,
    observer: &mut dyn RunObserver,
) -> usize {
    let questions = category.questions();
    let total = questions.len();
    let mut invoked = 0;

    for (index, question) in questions.iter().enumerate() {
        if results.contains(question.title) {
            debug!("Skipping '{}': already answered", question.title);
            observer.on_event(RunEvent::QuestionSkipped { question });
            continue;
        }

        observer.on_event(RunEvent::QuestionStarted {
            index,
            total,
            question,
        });

        invoked += 1;
        let outcome = match agent.invoke(question.text).await {
            Ok(answer) => {
                info!("Answered '{}'", question.title);
                Outcome::Answer(answer)
            }
            Err(e) => {
                warn!("Question '{}' failed: {}", question.title, e);
                Outcome::failure(QUESTION_ERROR_PREFIX, e)
            }
        };

        results.record(question.title, outcome.clone());
        observer.on_event(RunEvent::QuestionFinished {
            question,
            outcome: &outcome,
        });
    }

    invoked
}

/// Build the summary request from the stored results of `category`.
///
/// Results are joined in catalog order, error strings included verbatim.
pub fn summary_prompt(category: Category, results: &AnalysisResults) -> String {
    let insights = results
        .in_catalog_order(category)
        .into_iter()
        .map(|(_, outcome)| outcome.text())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Here are the analysis results:\n{}\n\n{}",
        insights, SUMMARY_INSTRUCTION
    )
}

/// Ask the agent for a summary of the stored results.
pub async fn synthesize_summary(
    agent: &dyn Agent,
    category: Category,
    results: &AnalysisResults,
    observer: &mut dyn RunObserver,
) -> Outcome {
    observer.on_event(RunEvent::SummaryStarted);

    let prompt = summary_prompt(category, results);
    let outcome = match agent.invoke(&prompt).await {
        Ok(summary) => {
            info!("Summary generated for {}", category);
            Outcome::Answer(summary)
        }
        Err(e) => {
            warn!("Summary generation failed: {}", e);
            Outcome::failure(SUMMARY_ERROR_PREFIX, e)
        }
    };

    observer.on_event(RunEvent::SummaryFinished { outcome: &outcome });
    outcome
}
