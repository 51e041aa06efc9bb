//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::catalog::Category;
use clap::Parser;
use std::path::PathBuf;

/// postlens - LLM-powered analysis of social media post metrics
///
/// Load a CSV export of post metrics, pick an analysis category, and let an
/// LLM agent answer the category's questions and summarize the findings.
///
/// Examples:
///   postlens --data posts.csv --category awareness
///   postlens --data posts.csv --category engagement --format json -o report.json
///   postlens --data posts.csv --preview
///   postlens --interactive
///   postlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV file with one row per post ("-" reads standard input)
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Analysis category to run
    #[arg(short = 'C', long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Drive the session with commands read from standard input
    #[arg(short, long)]
    pub interactive: bool,

    /// Model to use for analysis
    ///
    /// Can also be set via POSTLENS_MODEL env var or .postlens.toml config.
    #[arg(short, long, env = "POSTLENS_MODEL")]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible chat-completions API
    #[arg(long, value_name = "URL", env = "POSTLENS_API_URL")]
    pub api_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of dataset rows sent to the model
    #[arg(long, value_name = "ROWS")]
    pub max_rows: Option<usize>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .postlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load the dataset and show a preview without calling the LLM
    #[arg(long)]
    pub preview: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .postlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.data.is_none() && !self.interactive {
            return Err("Either --data or --interactive is required".to_string());
        }

        if self.interactive && self.data.as_ref().is_some_and(|d| d.as_os_str() == "-") {
            return Err(
                "Cannot read --data from standard input in --interactive mode".to_string(),
            );
        }

        if self.preview && self.interactive {
            return Err("Cannot use both --preview and --interactive".to_string());
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.max_rows == Some(0) {
            return Err("Max rows must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref data) = self.data {
            if data.as_os_str() != "-" && !data.is_file() {
                return Err(format!("Data file does not exist: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
