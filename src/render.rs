//! Projections of the parsed line model into renderable shapes.
//!
//! Both projections are pure and cheap enough to recompute on every state
//! read; [`crate::view::DiffView`] memoizes them as an optimization, not a
//! correctness requirement. Malformed hunks degrade to best-effort output,
//! never an error: this is read-only display logic.

use std::collections::BTreeSet;

use crate::patch::{Hunk, Line, LineKind, PatchFile};

/// One entry of the unified (vertically stacked) projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedLine {
    /// Index of the hunk this line belongs to; `None` for file headers
    pub hunk: Option<usize>,
    /// Whether the owning hunk is currently staged
    pub staged: bool,
    pub line: Line,
}

/// One visual row of the split (side-by-side) projection.
///
/// An empty cell renders blank with no line number. The left cell carries
/// its own old line number, the right cell its own new line number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitRow {
    pub left: Option<Line>,
    pub right: Option<Line>,
}

/// Flatten a parsed file into the unified projection: two synthetic
/// file-header lines, then per hunk one synthetic header line followed by
/// its lines in source order. When `staged` is given, each hunk's lines
/// are annotated from it.
#[must_use]
pub fn unified_lines(file: &PatchFile, staged: Option<&BTreeSet<usize>>) -> Vec<UnifiedLine> {
    let body: usize = file.hunks.iter().map(|h| h.lines.len() + 1).sum();
    let mut out = Vec::with_capacity(2 + body);

    out.push(UnifiedLine {
        hunk: None,
        staged: false,
        line: Line::header(file.old_file.clone()),
    });
    out.push(UnifiedLine {
        hunk: None,
        staged: false,
        line: Line::header(file.new_file.clone()),
    });

    for (index, hunk) in file.hunks.iter().enumerate() {
        let is_staged = staged.is_some_and(|set| set.contains(&index));
        out.push(UnifiedLine {
            hunk: Some(index),
            staged: is_staged,
            line: Line::header(hunk.header.clone()),
        });
        for line in &hunk.lines {
            out.push(UnifiedLine {
                hunk: Some(index),
                staged: is_staged,
                line: line.clone(),
            });
        }
    }

    out
}

/// Pair a hunk's lines into side-by-side rows with a single greedy cursor:
/// context fills both cells, a deletion immediately followed by an
/// addition becomes one matched row, and any remaining deletion or
/// addition gets an empty cell opposite it.
///
/// This assumes diff tools emit a modified line as an adjacent
/// deletion-then-addition pair; it does not align N deletions against M
/// additions beyond that local pairing.
#[must_use]
pub fn split_rows(hunk: &Hunk) -> Vec<SplitRow> {
    let lines = &hunk.lines;
    let mut rows = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        match lines[i].kind {
            LineKind::Context | LineKind::Header => {
                rows.push(SplitRow {
                    left: Some(lines[i].clone()),
                    right: Some(lines[i].clone()),
                });
                i += 1;
            }
            LineKind::Deletion => {
                if lines.get(i + 1).is_some_and(|next| next.kind == LineKind::Addition) {
                    rows.push(SplitRow {
                        left: Some(lines[i].clone()),
                        right: Some(lines[i + 1].clone()),
                    });
                    i += 2;
                } else {
                    rows.push(SplitRow {
                        left: Some(lines[i].clone()),
                        right: None,
                    });
                    i += 1;
                }
            }
            LineKind::Addition => {
                rows.push(SplitRow {
                    left: None,
                    right: Some(lines[i].clone()),
                });
                i += 1;
            }
        }
    }

    rows
}
