//! Report and panel rendering.
//!
//! Renders the session's question panels, summary and dataset preview as
//! terminal text, and whole runs as Markdown or JSON reports.

use crate::cli::OutputFormat;
use crate::dataset::DatasetPreview;
use crate::models::{FollowUp, Outcome, Panel, PanelStatus, ReportMetadata, RunReport};
use anyhow::{Context, Result};
use std::path::Path;

/// Heading shown above the synthesized summary.
pub const SUMMARY_HEADING: &str = "🎯 Key Insights & Recommendations";

/// Render question panels for the terminal.
pub fn render_panels(panels: &[Panel]) -> String {
    let mut output = String::new();

    for panel in panels {
        output.push_str(&format!("📊 {}\n", panel.title));
        output.push_str(&format!("   Question: {}\n", panel.question));
        match &panel.status {
            PanelStatus::Pending => output.push_str("   Analysis pending...\n"),
            PanelStatus::Answer(text) => {
                output.push_str("   Analysis:\n");
                output.push_str(&indent(text, "     "));
            }
            PanelStatus::Error(text) => {
                output.push_str(&format!("   ⚠️  {}\n", text));
            }
        }
        output.push('\n');
    }

    output
}

/// Render the summary block for the terminal.
pub fn render_summary(summary: &Outcome) -> String {
    let mut output = String::new();
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(SUMMARY_HEADING);
    output.push_str("\n\n");
    match summary {
        Outcome::Answer(text) => output.push_str(&indent(text, "  ")),
        Outcome::Error(text) => output.push_str(&format!("  ⚠️  {}\n", text)),
    }
    output
}

/// Render a dataset preview as an aligned text table.
pub fn render_preview(preview: &DatasetPreview) -> String {
    let mut output = format!(
        "Data Preview: {} ({} rows, {} columns)\n",
        preview.file_name, preview.row_count, preview.column_count
    );

    let widths: Vec<usize> = preview
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            preview
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    output.push_str(&format_row(&preview.columns));
    output.push('\n');
    output.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    output.push('\n');
    for row in &preview.rows {
        output.push_str(&format_row(row));
        output.push('\n');
    }

    output
}

fn indent(text: &str, prefix: &str) -> String {
    let mut output = String::new();
    for line in text.lines() {
        output.push_str(prefix);
        output.push_str(line);
        output.push('\n');
    }
    output
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Post Analysis Report\n\n");

    output.push_str(&generate_metadata_section(report));

    if let Some(ref preview) = report.dataset {
        output.push_str(&generate_dataset_section(preview));
    }

    output.push_str(&generate_panels_section(&report.panels));

    if let Some(ref summary) = report.summary {
        output.push_str(&generate_summary_section(summary));
    }

    output.push_str(&generate_followups_section(&report.followups));

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &RunReport) -> String {
    let metadata: &ReportMetadata = &report.metadata;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if let Some(category) = report.category {
        section.push_str(&format!("- **Category:** {}\n", category));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Run State:** {}\n", metadata.state));
    section.push_str(&format!("- **Questions Answered:** {}\n", metadata.answered));
    if metadata.failed > 0 {
        section.push_str(&format!("- **Questions Failed:** {}\n", metadata.failed));
    }
    section.push('\n');

    section
}

/// Generate the dataset preview section.
fn generate_dataset_section(preview: &DatasetPreview) -> String {
    let mut section = String::new();

    section.push_str("## Dataset\n\n");
    section.push_str(&format!(
        "*{}: {} rows, {} columns*\n\n",
        preview.file_name, preview.row_count, preview.column_count
    ));

    if preview.columns.is_empty() {
        return section;
    }

    section.push_str(&format!("| {} |\n", preview.columns.join(" | ")));
    section.push_str(&format!(
        "|{}\n",
        preview.columns.iter().map(|_| ":---|").collect::<String>()
    ));
    for row in &preview.rows {
        let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate one subsection per question.
fn generate_panels_section(panels: &[Panel]) -> String {
    let mut section = String::new();

    section.push_str("## Analysis\n\n");

    if panels.is_empty() {
        section.push_str("No category selected.\n\n");
        return section;
    }

    for panel in panels {
        section.push_str(&format!("### 📊 {}\n\n", panel.title));
        section.push_str(&format!("**Question:** _{}_\n\n", panel.question));
        match &panel.status {
            PanelStatus::Pending => section.push_str("Analysis pending...\n\n"),
            PanelStatus::Answer(text) => {
                section.push_str("**Analysis:**\n\n");
                section.push_str(text);
                section.push_str("\n\n");
            }
            PanelStatus::Error(text) => {
                section.push_str(&format!("> ⚠️ {}\n\n", text));
            }
        }
    }

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &Outcome) -> String {
    let mut section = String::new();

    section.push_str("---\n\n");
    section.push_str(&format!("## {}\n\n", SUMMARY_HEADING));
    match summary {
        Outcome::Answer(text) => section.push_str(text),
        Outcome::Error(text) => section.push_str(&format!("> ⚠️ {}", text)),
    }
    section.push_str("\n\n");

    section
}

/// Generate the follow-up questions section.
fn generate_followups_section(followups: &[FollowUp]) -> String {
    if followups.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Follow-up Questions\n\n");
    for followup in followups {
        section.push_str(&format!("**Q:** {}\n\n", followup.question));
        section.push_str(&format!("{}\n\n", followup.outcome.text()));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by postlens*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render `report` in `format` and write it to `path`.
pub fn write_report(report: &RunReport, format: OutputFormat, path: &Path) -> Result<()> {
    let output = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
