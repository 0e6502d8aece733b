//! Unified-diff text to structured line model.
//!
//! The parser fails soft: malformed input produces an empty result rather
//! than an error, so rendering code treats "nothing to show" uniformly
//! with "parse error". Skipped input is reported through `tracing` only.

pub mod file;
pub mod hunk;
pub mod line;

pub use file::PatchFile;
pub use hunk::Hunk;
pub use line::{Line, LineKind};

use tracing::debug;

/// Parse one or more concatenated unified-diff file sections.
///
/// Sections are bounded by a `--- `/`+++ ` filename marker pair on
/// adjacent lines. Input containing no such pair parses to an empty
/// vector; callers cannot distinguish that from a genuinely empty diff
/// without inspecting the raw text themselves.
#[must_use]
pub fn parse_patch(text: &str) -> Vec<PatchFile> {
    let lines: Vec<&str> = text.lines().collect();

    let mut boundaries = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("--- ") && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ "))
        {
            boundaries.push(i);
        }
    }

    let files: Vec<PatchFile> = boundaries
        .iter()
        .enumerate()
        .filter_map(|(k, &start)| {
            let end = boundaries.get(k + 1).copied().unwrap_or(lines.len());
            PatchFile::parse(&lines[start..end].join("\n"))
        })
        .collect();

    if files.is_empty() && !text.trim().is_empty() {
        debug!("no parseable file sections in diff text");
    }

    files
}
