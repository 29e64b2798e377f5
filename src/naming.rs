//! Output file naming.
//!
//! Flat names look like `news__a__3f2a9c1d.md`: the relative path's
//! components joined with `__`, the last extension dropped, then a short MD5
//! of the relative path string. The hash is what keeps `a/b.html` and
//! `a/b.htm` apart, since both join to `a__b`.

use std::path::{Path, PathBuf};

use crate::models::OutputFormat;

/// Separator used between path components and before the hash suffix.
pub const SEPARATOR: &str = "__";

/// Number of hex characters of the path hash kept in the name.
const HASH_LEN: usize = 8;

/// Derive a flat, collision-safe file name from a path relative to the input root.
pub fn flat_name(relative_path: &Path, format: OutputFormat) -> String {
    let parts: Vec<String> = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let joined = parts.join(SEPARATOR);
    let base = match joined.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => joined.as_str(),
    };

    format!(
        "{}{}{}{}",
        base,
        SEPARATOR,
        path_hash(relative_path),
        format.extension()
    )
}

/// Legacy layout: mirror the input tree under `output_root`, swapping the
/// extension for the output format's.
pub fn mirrored_path(output_root: &Path, relative_path: &Path, format: OutputFormat) -> PathBuf {
    output_root
        .join(relative_path)
        .with_extension(format.extension().trim_start_matches('.'))
}

fn path_hash(relative_path: &Path) -> String {
    let digest = md5::compute(relative_path.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..HASH_LEN].to_string()
}
