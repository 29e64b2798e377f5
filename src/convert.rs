//! Single-document conversion: read, extract, normalize.

use std::path::Path;
use thiserror::Error;

use crate::extract::{ExtractError, Extractor};
use crate::models::{ExtractOptions, OutputFormat};
use crate::normalize::{normalize_markdown, normalize_text};

/// Why one document could not be converted. Always scoped to that document.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not extract main text (empty result)")]
    ExtractionEmpty,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Convert the HTML file at `path` into normalized text.
///
/// Undecodable bytes are replaced with U+FFFD, never rejected.
pub async fn convert_document(
    extractor: &dyn Extractor,
    path: &Path,
    options: &ExtractOptions,
) -> Result<String, ConvertError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ConvertError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let html = String::from_utf8_lossy(&bytes);

    convert_html(extractor, &html, options).await
}

/// Convert an in-memory HTML string. Shared by files and the server.
pub async fn convert_html(
    extractor: &dyn Extractor,
    html: &str,
    options: &ExtractOptions,
) -> Result<String, ConvertError> {
    let extracted = extractor
        .extract(html, options)
        .await?
        .filter(|text| !text.is_empty())
        .ok_or(ConvertError::ExtractionEmpty)?;

    Ok(match options.output_format {
        OutputFormat::Txt => normalize_text(&extracted),
        OutputFormat::Markdown => normalize_markdown(&extracted),
        OutputFormat::Html => extracted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Returns a canned result regardless of input.
    struct Canned(Result<Option<String>, &'static str>);

    #[async_trait]
    impl Extractor for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn extract(
            &self,
            _html: &str,
            _options: &ExtractOptions,
        ) -> Result<Option<String>, ExtractError> {
            self.0
                .clone()
                .map_err(|msg| ExtractError::Failed(msg.to_string()))
        }
    }

    fn options(format: OutputFormat) -> ExtractOptions {
        ExtractOptions {
            output_format: format,
            ..ExtractOptions::default()
        }
    }

    #[tokio::test]
    async fn txt_is_normalized() {
        let ex = Canned(Ok(Some("a  \r\n\n\n\n\nb".to_string())));
        let out = convert_html(&ex, "<p/>", &options(OutputFormat::Txt))
            .await
            .unwrap();
        assert_eq!(out, "a\n\n\nb\n");
    }

    #[tokio::test]
    async fn markdown_keeps_spacing() {
        let ex = Canned(Ok(Some("\n# T\n\n\n\nbody  ".to_string())));
        let out = convert_html(&ex, "<p/>", &options(OutputFormat::Markdown))
            .await
            .unwrap();
        assert_eq!(out, "# T\n\n\n\nbody\n");
    }

    #[tokio::test]
    async fn html_passes_through() {
        let ex = Canned(Ok(Some("<p>x</p>  \n\n\n\n".to_string())));
        let out = convert_html(&ex, "<p/>", &options(OutputFormat::Html))
            .await
            .unwrap();
        assert_eq!(out, "<p>x</p>  \n\n\n\n");
    }

    #[tokio::test]
    async fn none_or_empty_is_extraction_empty() {
        for canned in [Ok(None), Ok(Some(String::new()))] {
            let err = convert_html(&Canned(canned), "<p/>", &ExtractOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ConvertError::ExtractionEmpty));
        }
    }

    #[tokio::test]
    async fn extractor_error_carries_message() {
        let err = convert_html(&Canned(Err("parser exploded")), "<p/>", &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parser exploded"));
    }

    #[tokio::test]
    async fn reads_invalid_utf8_without_failing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.html");
        std::fs::write(&path, b"<p>caf\xe9 au lait</p>").unwrap();
        let out = convert_document(
            &crate::extract::BuiltinExtractor,
            &path,
            &options(OutputFormat::Txt),
        )
        .await
        .unwrap();
        assert!(out.contains("caf\u{FFFD} au lait"));
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = convert_document(
            &crate::extract::BuiltinExtractor,
            &tmp.path().join("gone.html"),
            &ExtractOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::Read { .. }));
    }
}
