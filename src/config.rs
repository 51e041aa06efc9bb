//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.postlens.toml` files.

use crate::agent::AgentSettings;
use crate::catalog::Category;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".postlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Category used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<Category>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            default_category: None,
        }
    }
}

fn default_output() -> String {
    "postlens_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_timeout() -> u64 {
    300
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Maximum number of rows embedded in agent prompts.
    #[serde(default = "default_max_context_rows")]
    pub max_context_rows: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_context_rows: default_max_context_rows(),
        }
    }
}

fn default_max_context_rows() -> usize {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via env) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(max_rows) = args.max_rows {
            self.dataset.max_context_rows = max_rows;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(category) = args.category {
            self.general.default_category = Some(category);
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Agent settings derived from the model and dataset sections.
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            api_url: self.model.api_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
            max_context_rows: self.dataset.max_context_rows,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.dataset.max_context_rows, 500);
        assert!(config.general.default_category.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "weekly.md"
default_category = "engagement"

[model]
name = "gpt-4"
temperature = 0.2
api_url = "http://localhost:8080/v1"

[dataset]
max_context_rows = 50
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "weekly.md");
        assert_eq!(config.general.default_category, Some(Category::Engagement));
        assert_eq!(config.model.name, "gpt-4");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 300);
        assert_eq!(config.dataset.max_context_rows, 50);
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config: Config = toml::from_str("[model]\nname = \"gpt-4\"\n").unwrap();
        let args = Args::try_parse_from([
            "postlens",
            "--data",
            "posts.csv",
            "--temperature",
            "0.5",
            "--category",
            "conversions",
        ])
        .unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.model.name, "gpt-4");
        assert_eq!(config.model.temperature, 0.5);
        assert_eq!(config.general.default_category, Some(Category::Conversions));

        let settings = config.agent_settings();
        assert_eq!(settings.model_name, "gpt-4");
        assert_eq!(settings.max_context_rows, 500);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[dataset]"));
    }
}
