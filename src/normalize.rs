//! Whitespace normalization for extractor output.
//!
//! Both functions are pure and total. The result is always the stripped
//! content followed by a single `\n`, so empty input yields `"\n"`.

/// Maximum number of consecutive blank lines kept by [`normalize_text`].
const MAX_BLANK_RUN: usize = 2;

/// Normalize plain text: unify line endings, trim trailing whitespace on
/// every line, keep at most two consecutive blank lines, strip the document
/// and end it with exactly one newline.
pub fn normalize_text(text: &str) -> String {
    let text = unify_line_endings(text);

    let mut cleaned: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in text.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= MAX_BLANK_RUN {
                cleaned.push("");
            }
            continue;
        }
        blank_run = 0;
        cleaned.push(line);
    }

    let mut out = cleaned.join("\n").trim().to_string();
    out.push('\n');
    out
}

/// Normalize markdown: unify line endings and end with exactly one newline.
///
/// Interior blank lines are significant in markdown and are left alone.
pub fn normalize_markdown(md: &str) -> String {
    let md = unify_line_endings(md);
    let mut out = md.trim().to_string();
    out.push('\n');
    out
}

fn unify_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
