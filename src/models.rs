//! Core data models shared by the conversion pipeline and the retrieval side.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output representation requested from the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Txt,
    /// Cleaned main-content HTML, written without normalization.
    Html,
}

impl OutputFormat {
    /// File extension (with dot) for artifacts in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => ".md",
            _ => ".txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Txt => "txt",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "txt" | "text" => Ok(OutputFormat::Txt),
            "html" => Ok(OutputFormat::Html),
            other => bail!(
                "Output format must be 'markdown', 'txt' or 'html', got: {}",
                other
            ),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options handed to the extractor for one document.
///
/// Metadata extraction is deliberately absent: the conversion path only
/// ever asks for content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub output_format: OutputFormat,
    pub include_tables: bool,
    pub include_comments: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Markdown,
            include_tables: true,
            include_comments: false,
        }
    }
}

/// An HTML file discovered under the input root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Path relative to the input root, or the bare file name when the
    /// document lives outside it.
    pub relative_path: PathBuf,
}

/// Result of converting one input document during a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub input_path: String,
    pub output_path: Option<String>,
    pub ok: bool,
    pub extracted_chars: usize,
    pub error: Option<String>,
}

impl ConversionOutcome {
    pub fn success(input_path: String, output_path: String, extracted_chars: usize) -> Self {
        Self {
            input_path,
            output_path: Some(output_path),
            ok: true,
            extracted_chars,
            error: None,
        }
    }

    pub fn failure(input_path: String, error: String) -> Self {
        Self {
            input_path,
            output_path: None,
            ok: false,
            extracted_chars: 0,
            error: Some(error),
        }
    }
}

/// A markdown file from the retrieval corpus, loaded in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    pub path: PathBuf,
    pub name: String,
    pub text: String,
}
