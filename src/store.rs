//! Filesystem-backed document enumeration.
//!
//! Discovers HTML inputs for the batch cleaner and markdown files for the
//! retrieval corpus. Ordering is always by path so runs are deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{CorpusDocument, SourceDocument};

/// Glob patterns recognized as HTML input.
pub const HTML_GLOBS: &[&str] = &["**/*.html", "**/*.htm"];

/// Recursively discover HTML documents under `root`, sorted by path.
pub fn discover_html(root: &Path) -> Result<Vec<SourceDocument>> {
    if !root.exists() {
        bail!("Input directory does not exist: {}", root.display());
    }

    let patterns: Vec<String> = HTML_GLOBS.iter().map(|g| g.to_string()).collect();
    let include_set = build_globset(&patterns)?;

    let mut docs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !include_set.is_match(relative) {
            continue;
        }

        docs.push(SourceDocument {
            path: path.to_path_buf(),
            relative_path: relative.to_path_buf(),
        });
    }

    docs.sort();
    Ok(docs)
}

/// Wrap an explicit file list as documents relative to `root`, sorted by path.
///
/// Files outside `root` are named by their bare file name.
pub fn documents_from_paths(root: &Path, files: &[PathBuf]) -> Vec<SourceDocument> {
    let mut paths = files.to_vec();
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let relative_path = relative_to(root, &path);
            SourceDocument {
                path,
                relative_path,
            }
        })
        .collect()
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    let root = without_cur_dir(root);
    match without_cur_dir(path).strip_prefix(&root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
    }
}

/// Drop `.` components so `./data/html` and `data/html` compare equal.
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Read a file as UTF-8, replacing invalid bytes with U+FFFD.
pub fn read_lossy(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// List `*.md` files directly inside `dir`, sorted by path.
///
/// A missing directory is an empty corpus, not an error.
pub fn list_markdown(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("md") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Load every markdown document in `dir`, skipping files that cannot be read.
pub fn load_corpus(dir: &Path) -> Result<Vec<CorpusDocument>> {
    let mut docs = Vec::new();
    for path in list_markdown(dir)? {
        match read_lossy(&path) {
            Ok(text) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                docs.push(CorpusDocument { path, name, text });
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable corpus file");
            }
        }
    }
    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
