//! Rendering of analysis results for the terminal and for report files.

pub mod generator;

pub use generator::{render_panels, render_preview, render_summary, write_report};
