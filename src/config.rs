//! TOML configuration parsing and validation.
//!
//! Every table rejects unknown keys, so a typo in `newsctx.toml` fails at
//! load time instead of being silently ignored. A missing config file is not
//! an error: [`load_config`] falls back to [`Config::default`], whose paths
//! are relative to the working directory.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{ExtractOptions, OutputFormat};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub flat_output: bool,
    #[serde(default = "default_true")]
    pub include_tables: bool,
    #[serde(default)]
    pub include_comments: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            output_format: default_output_format(),
            overwrite: true,
            flat_output: true,
            include_tables: true,
            include_comments: false,
            concurrency: default_concurrency(),
        }
    }
}

impl CleanerConfig {
    /// Extraction options derived from the configured format and flags.
    pub fn extract_options(&self) -> Result<ExtractOptions> {
        Ok(ExtractOptions {
            output_format: self.output_format.parse()?,
            include_tables: self.include_tables,
            include_comments: self.include_comments,
        })
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./data/html")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/output")
}
fn default_output_format() -> String {
    "markdown".to_string()
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExtractorConfig {
    #[serde(default = "default_extractor_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider: default_extractor_provider(),
            url: None,
            timeout_secs: default_extractor_timeout(),
        }
    }
}

fn default_extractor_provider() -> String {
    "builtin".to_string()
}
fn default_extractor_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("./data/news_output")
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_completion_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_completion_model() -> String {
    "gemma3:12b-it-qat".to_string()
}
fn default_completion_timeout() -> u64 {
    300
}
fn default_max_context_chars() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Load and validate the config at `path`, or the defaults if it is absent.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    config
        .cleaner
        .output_format
        .parse::<OutputFormat>()
        .context("cleaner.output_format")?;

    if config.cleaner.concurrency == 0 {
        bail!("cleaner.concurrency must be >= 1");
    }

    match config.extractor.provider.as_str() {
        "builtin" => {}
        "http" => {
            if config.extractor.url.is_none() {
                bail!("extractor.url must be specified when provider is 'http'");
            }
        }
        other => bail!(
            "Unknown extractor provider: '{}'. Must be builtin or http.",
            other
        ),
    }

    if config.extractor.timeout_secs == 0 || config.completion.timeout_secs == 0 {
        bail!("timeout_secs must be > 0");
    }

    if config.completion.max_context_chars == 0 {
        bail!("completion.max_context_chars must be > 0");
    }

    Ok(())
}
