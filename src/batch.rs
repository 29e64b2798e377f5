//! Batch conversion orchestration.
//!
//! Coordinates the full clean flow: discovery → per-document conversion →
//! output naming → overwrite policy → write → manifest. A failure in one
//! document is recorded in its [`ConversionOutcome`] and never stops the
//! batch; only batch-start problems (missing input root, unwritable output
//! root) abort the run, and they do so before any manifest is written.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::CleanerConfig;
use crate::convert::convert_document;
use crate::extract::Extractor;
use crate::manifest::Manifest;
use crate::models::{ConversionOutcome, ExtractOptions, SourceDocument};
use crate::naming::{flat_name, mirrored_path};
use crate::progress::{BatchProgressEvent, BatchProgressReporter};
use crate::store;

/// Everything a batch run needs to know.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extract: ExtractOptions,
    /// Rewrite outputs that already exist.
    pub overwrite: bool,
    /// Process at most this many documents, in sorted order.
    pub limit: Option<usize>,
    /// Flat collision-safe names instead of mirroring the input tree.
    pub flat_output: bool,
    /// Explicit inputs; when `None` the input root is walked.
    pub input_files: Option<Vec<PathBuf>>,
    /// Documents converted at once. Results keep input order regardless.
    pub concurrency: usize,
}

impl BatchOptions {
    pub fn from_config(config: &CleanerConfig) -> Result<Self> {
        Ok(Self {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            extract: config.extract_options()?,
            overwrite: config.overwrite,
            limit: None,
            flat_output: config.flat_output,
            input_files: None,
            concurrency: config.concurrency,
        })
    }

    /// Where the artifact for `doc` goes.
    pub fn output_path(&self, doc: &SourceDocument) -> PathBuf {
        if self.flat_output {
            self.output_dir
                .join(flat_name(&doc.relative_path, self.extract.output_format))
        } else {
            mirrored_path(
                &self.output_dir,
                &doc.relative_path,
                self.extract.output_format,
            )
        }
    }
}

/// Run one batch and write `manifest.json` at the output root.
///
/// Returns the outcomes in processing order.
pub async fn run_batch(
    options: &BatchOptions,
    extractor: &dyn Extractor,
    progress: &dyn BatchProgressReporter,
) -> Result<Vec<ConversionOutcome>> {
    if !options.input_dir.exists() {
        bail!(
            "Input directory does not exist: {}",
            options.input_dir.display()
        );
    }
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            options.output_dir.display()
        )
    })?;

    progress.report(BatchProgressEvent::Discovering {
        input_dir: options.input_dir.display().to_string(),
    });

    let mut docs = match &options.input_files {
        Some(files) => store::documents_from_paths(&options.input_dir, files),
        None => store::discover_html(&options.input_dir)?,
    };

    if let Some(lim) = options.limit {
        docs.truncate(lim);
    }

    info!(
        input_dir = %options.input_dir.display(),
        output_dir = %options.output_dir.display(),
        format = %options.extract.output_format,
        overwrite = options.overwrite,
        documents = docs.len(),
        extractor = extractor.name(),
        "starting batch"
    );

    let total = docs.len() as u64;
    let done = AtomicU64::new(0);

    let results: Vec<ConversionOutcome> = stream::iter(docs.iter())
        .map(|doc| {
            let done = &done;
            async move {
                let outcome = process_document(options, extractor, doc).await;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(BatchProgressEvent::Converting { n, total });
                outcome
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let manifest = Manifest::new(&options.input_dir, &options.output_dir, results.clone());
    let manifest_path = manifest.write(&options.output_dir)?;
    info!(
        path = %manifest_path.display(),
        total = manifest.total,
        ok = manifest.ok,
        failed = manifest.failed,
        "wrote manifest"
    );

    progress.report(BatchProgressEvent::Finished {
        ok: manifest.ok as u64,
        failed: manifest.failed as u64,
    });

    Ok(results)
}

async fn process_document(
    options: &BatchOptions,
    extractor: &dyn Extractor,
    doc: &SourceDocument,
) -> ConversionOutcome {
    let input_path = doc.path.display().to_string();
    match convert_and_write(options, extractor, doc).await {
        Ok((out_path, chars)) => {
            ConversionOutcome::success(input_path, out_path.display().to_string(), chars)
        }
        Err(e) => {
            warn!(input = %input_path, error = %format!("{:#}", e), "conversion failed");
            ConversionOutcome::failure(input_path, format!("{:#}", e))
        }
    }
}

async fn convert_and_write(
    options: &BatchOptions,
    extractor: &dyn Extractor,
    doc: &SourceDocument,
) -> Result<(PathBuf, usize)> {
    let out_path = options.output_path(doc);

    if !options.overwrite {
        if let Some(chars) = existing_output(&out_path) {
            debug!(output = %out_path.display(), "output exists, skipping");
            return Ok((out_path, chars));
        }
    }

    let text = convert_document(extractor, &doc.path, &options.extract).await?;
    write_output(&out_path, &text).await?;
    Ok((out_path, text.chars().count()))
}

/// Character count of an existing output, or `None` if there is none.
///
/// An empty file, or one whose metadata cannot be read, counts as present
/// with zero characters: it is reported but not rewritten.
fn existing_output(path: &Path) -> Option<usize> {
    match path.try_exists() {
        Ok(false) => None,
        Ok(true) => match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => Some(
                store::read_lossy(path)
                    .map(|text| text.chars().count())
                    .unwrap_or(0),
            ),
            _ => Some(0),
        },
        Err(_) => Some(0),
    }
}

async fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Convert a single file outside of a batch.
///
/// Writes to `output` when given; otherwise to a flat name under
/// `output_dir`. Always overwrites and writes no manifest.
pub async fn clean_file(
    extractor: &dyn Extractor,
    input: &Path,
    output: Option<&Path>,
    output_dir: &Path,
    extract: &ExtractOptions,
) -> Result<PathBuf> {
    let text = convert_document(extractor, input, extract).await?;

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let rel = input
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input.to_path_buf());
            output_dir.join(flat_name(&rel, extract.output_format))
        }
    };

    write_output(&out_path, &text).await?;
    Ok(out_path)
}
