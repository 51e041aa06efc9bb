//! Analysis runs over the question catalog.
//!
//! The runner asks the agent each question of the selected category and
//! synthesizes a summary. Session-level sequencing lives in `session`.

pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::{
    answer_questions, synthesize_summary, NoopObserver, RunEvent, RunObserver,
};
