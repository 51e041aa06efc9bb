//! Terminal progress for analysis runs.

use crate::analysis::{RunEvent, RunObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Shows a spinner while the agent works and one line per finished question.
pub struct SpinnerObserver {
    enabled: bool,
    spinner: Option<ProgressBar>,
}

impl SpinnerObserver {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            spinner: None,
        }
    }

    fn spin(&mut self, message: String) {
        self.clear();
        if !self.enabled {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn clear(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl RunObserver for SpinnerObserver {
    fn on_event(&mut self, event: RunEvent<'_>) {
        match event {
            RunEvent::QuestionStarted {
                index,
                total,
                question,
            } => {
                self.spin(format!(
                    "Agent is thinking... ({}/{}) {}",
                    index + 1,
                    total,
                    question.title
                ));
            }
            RunEvent::QuestionSkipped { question } => {
                if self.enabled {
                    println!("   ↩️  {} (already answered)", question.title);
                }
            }
            RunEvent::QuestionFinished { question, outcome } => {
                self.clear();
                if self.enabled {
                    let mark = if outcome.is_error() { "⚠️ " } else { "✅" };
                    println!("   {} {}", mark, question.title);
                }
            }
            RunEvent::SummaryStarted => self.spin("Generating summary...".to_string()),
            RunEvent::SummaryFinished { outcome } => {
                self.clear();
                if self.enabled && outcome.is_error() {
                    println!("   ⚠️  Summary could not be generated");
                }
            }
        }
    }
}

impl Drop for SpinnerObserver {
    fn drop(&mut self) {
        self.clear();
    }
}
