//! Read-only access to the converted news archive.
//!
//! Backs the `list`, `get`, `search` and `latest` commands and the matching
//! HTTP routes. Only top-level `*.md` files of the corpus directory are
//! visible.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Component, Path};
use thiserror::Error;

use crate::store;

/// Characters of context kept before a search hit.
const SNIPPET_BEFORE: usize = 50;
/// Characters kept from the start of a search hit.
const SNIPPET_AFTER: usize = 150;
/// Characters shown as a summary in `latest`.
const SUMMARY_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Article not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub name: String,
    pub summary: String,
    pub modified: DateTime<Utc>,
}

/// File names of all articles, sorted.
pub fn list_articles(dir: &Path) -> anyhow::Result<Vec<String>> {
    Ok(store::list_markdown(dir)?
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect())
}

/// Full text of one article. `name` must be a bare file name.
pub fn get_article(dir: &Path, name: &str) -> Result<String, ArchiveError> {
    let mut components = Path::new(name).components();
    let is_bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_bare || name.contains('\\') {
        return Err(ArchiveError::AccessDenied(name.to_string()));
    }

    let path = dir.join(name);
    if !path.is_file() {
        return Err(ArchiveError::NotFound(name.to_string()));
    }
    Ok(store::read_lossy(&path)?)
}

/// Case-insensitive substring search. One hit per matching article.
pub fn search_articles(dir: &Path, query: &str) -> anyhow::Result<Vec<SearchHit>> {
    let needle = query.to_lowercase();
    let mut hits = Vec::new();

    for doc in store::load_corpus(dir)? {
        if let Some(idx) = find_case_insensitive(&doc.text, &needle) {
            hits.push(SearchHit {
                name: doc.name,
                snippet: snippet_around(&doc.text, idx),
            });
        }
    }
    Ok(hits)
}

/// Up to `limit` articles, most recently modified first.
pub fn latest_articles(dir: &Path, limit: usize) -> anyhow::Result<Vec<ArticleSummary>> {
    let mut dated = Vec::new();
    for path in store::list_markdown(dir)? {
        let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) else {
            continue;
        };
        dated.push((DateTime::<Utc>::from(modified), path));
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = Vec::new();
    for (modified, path) in dated.into_iter().take(limit) {
        let Ok(text) = store::read_lossy(&path) else {
            continue;
        };
        let summary: String = text.chars().take(SUMMARY_CHARS).collect();
        out.push(ArticleSummary {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            summary: summary.replace('\n', " "),
            modified,
        });
    }
    Ok(out)
}

/// Byte offset of the first case-insensitive occurrence of `needle_lower`.
fn find_case_insensitive(haystack: &str, needle_lower: &str) -> Option<usize> {
    haystack
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| starts_with_lowered(&haystack[i..], needle_lower))
}

fn starts_with_lowered(s: &str, needle_lower: &str) -> bool {
    let mut lowered = s.chars().flat_map(char::to_lowercase);
    needle_lower.chars().all(|n| lowered.next() == Some(n))
}

fn snippet_around(text: &str, byte_idx: usize) -> String {
    let hit = text[..byte_idx].chars().count();
    let start = hit.saturating_sub(SNIPPET_BEFORE);
    let end = hit + SNIPPET_AFTER;
    text.chars()
        .skip(start)
        .take(end - start)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn archive(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, text) in files {
            fs::write(tmp.path().join(name), text).unwrap();
        }
        tmp
    }

    #[test]
    fn lists_markdown_sorted() {
        let tmp = archive(&[("b.md", "b"), ("a.md", "a"), ("notes.txt", "x")]);
        assert_eq!(list_articles(tmp.path()).unwrap(), vec!["a.md", "b.md"]);
        assert!(list_articles(&tmp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn get_rejects_traversal() {
        let tmp = archive(&[("a.md", "alpha")]);
        assert_eq!(get_article(tmp.path(), "a.md").unwrap(), "alpha");
        for bad in ["../secret.md", "sub/a.md", "..", "/etc/passwd", "a\\..\\b.md"] {
            assert!(
                matches!(get_article(tmp.path(), bad), Err(ArchiveError::AccessDenied(_))),
                "{} should be denied",
                bad
            );
        }
        assert!(matches!(
            get_article(tmp.path(), "gone.md"),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn search_snippet_window() {
        let body = format!("{}Ceasefire\nannounced{}", "x".repeat(80), "y".repeat(300));
        let tmp = archive(&[("a.md", body.as_str()), ("b.md", "nothing relevant")]);

        let hits = search_articles(tmp.path(), "CEASEFIRE").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a.md");
        let snippet = &hits[0].snippet;
        assert_eq!(snippet.chars().count(), 200);
        assert!(snippet.starts_with(&"x".repeat(50)));
        assert!(snippet.contains("Ceasefire announced"));
    }

    #[test]
    fn search_near_start_and_non_ascii() {
        let tmp = archive(&[("a.md", "Ölpreis steigt")]);
        let hits = search_articles(tmp.path(), "ölpreis").unwrap();
        assert_eq!(hits[0].snippet, "Ölpreis steigt");
    }

    #[test]
    fn latest_orders_by_mtime() {
        let tmp = archive(&[("old.md", "old story"), ("new.md", "new\nstory")]);
        let old = fs::File::options()
            .write(true)
            .open(tmp.path().join("old.md"))
            .unwrap();
        old.set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(3600))
            .unwrap();

        let latest = latest_articles(tmp.path(), 5).unwrap();
        assert_eq!(latest[0].name, "new.md");
        assert_eq!(latest[0].summary, "new story");
        assert_eq!(latest[1].name, "old.md");

        assert_eq!(latest_articles(tmp.path(), 1).unwrap().len(), 1);
    }
}
