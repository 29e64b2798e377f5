//! Term-frequency retrieval over the markdown corpus.
//!
//! Scoring is deliberately naive: each query term contributes its raw
//! substring occurrence count in the lowercased document text. No index is
//! kept; every query re-scans the corpus.

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::models::CorpusDocument;
use crate::store;

/// Words dropped from queries before scoring.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is", "are",
    "was", "were", "be", "this", "that", "it", "what", "which", "who", "when", "where", "why",
    "how", "latest", "news", "question", "from", "by", "as",
];

/// Lowercase, strip punctuation, split on whitespace, drop stop words.
///
/// When every token is a stop word the unfiltered tokens are returned, so a
/// query like "what is the news" still scores something.
pub fn query_terms(query: &str) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    let tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();

    let filtered: Vec<String> = tokens
        .iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .cloned()
        .collect();

    if filtered.is_empty() {
        tokens
    } else {
        filtered
    }
}

/// Sum of substring occurrence counts of `terms` in `text`, case-insensitive.
pub fn score(text: &str, terms: &[String]) -> usize {
    let lowered = text.to_lowercase();
    terms
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| lowered.matches(t.as_str()).count())
        .sum()
}

/// The best-scoring document, or `None` if nothing scores above zero.
///
/// Ties go to the earliest document in `corpus`.
pub fn find_best<'a>(corpus: &'a [CorpusDocument], query: &str) -> Option<&'a CorpusDocument> {
    let terms = query_terms(query);
    let mut best: Option<&CorpusDocument> = None;
    let mut best_score = 0;

    for doc in corpus {
        let s = score(&doc.text, &terms);
        if s > best_score {
            best_score = s;
            best = Some(doc);
        }
    }

    if let Some(doc) = best {
        debug!(name = %doc.name, score = best_score, "best match");
    }
    best
}

/// Load `dir/*.md` and return the best match for `query`.
pub fn find_best_in_dir(dir: &Path, query: &str) -> Result<Option<CorpusDocument>> {
    let corpus = store::load_corpus(dir)?;
    Ok(find_best(&corpus, query).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn doc(name: &str, text: &str) -> CorpusDocument {
        CorpusDocument {
            path: PathBuf::from(name),
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn stop_words_and_punctuation_removed() {
        assert_eq!(
            query_terms("What are officials in Iran saying?"),
            vec!["officials", "iran", "saying"]
        );
    }

    #[test]
    fn all_stop_words_fall_back_to_tokens() {
        assert_eq!(query_terms("What is the news?"), vec!["what", "is", "the", "news"]);
        assert!(query_terms("  ").is_empty());
    }

    #[test]
    fn score_counts_substrings() {
        let terms = vec!["iran".to_string()];
        assert_eq!(score("Iran, IRAN and iranian", &terms), 3);
        assert_eq!(score("nothing here", &terms), 0);
    }

    #[test]
    fn picks_first_of_tied_documents() {
        let corpus = vec![
            doc("doc1", "Iran sanctions news"),
            doc("doc2", "Danish officials statement"),
            doc("doc3", "unrelated text"),
        ];
        let best = find_best(&corpus, "What are officials in Iran saying?").unwrap();
        assert_eq!(best.name, "doc1");
    }

    #[test]
    fn strictly_higher_score_wins() {
        let corpus = vec![
            doc("doc1", "Iran sanctions news"),
            doc("doc2", "Iran officials met Iran officials"),
        ];
        let best = find_best(&corpus, "officials in Iran").unwrap();
        assert_eq!(best.name, "doc2");
    }

    #[test]
    fn empty_corpus_and_zero_scores_find_nothing() {
        assert!(find_best(&[], "anything").is_none());
        let corpus = vec![doc("doc1", "weather report")];
        assert!(find_best(&corpus, "election results").is_none());
    }

    #[test]
    fn find_best_in_dir_reads_markdown_only() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "Budget talks stall").unwrap();
        std::fs::write(tmp.path().join("b.md"), "Election night recap: election").unwrap();
        std::fs::write(tmp.path().join("c.txt"), "election election election").unwrap();

        let best = find_best_in_dir(tmp.path(), "election").unwrap().unwrap();
        assert_eq!(best.name, "b.md");

        let missing = find_best_in_dir(&tmp.path().join("nope"), "election").unwrap();
        assert!(missing.is_none());
    }
}
