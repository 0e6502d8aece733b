//! Unified-diff view engine.
//!
//! `patchview` turns already-computed unified-diff text into a structured
//! line model, projects that model into unified (stacked) and split
//! (side-by-side) renderings, and tracks per-hunk staging against an
//! external collaborator with a single-in-flight guard. It does not read
//! or write repositories itself beyond the narrow [`git::GitIndexStager`]
//! adapter, and it never computes diffs: that happens upstream.
//!
//! # Example
//!
//! ```
//! use patchview::patch::parse_patch;
//! use patchview::render::split_rows;
//!
//! let files = parse_patch("--- a/x\n+++ b/x\n@@ -1,1 +1,1 @@\n-old\n+new\n");
//! let rows = split_rows(&files[0].hunks[0]);
//! assert_eq!(rows.len(), 1); // deletion and addition pair into one row
//! ```

pub mod git;
pub mod patch;
pub mod render;
pub mod stage;
pub mod view;

pub use git::GitIndexStager;
pub use patch::{Hunk, Line, LineKind, PatchFile, parse_patch};
pub use render::{SplitRow, UnifiedLine, split_rows, unified_lines};
pub use stage::{CollaboratorError, HunkStager, StageError, StagingController, StagingState};
pub use view::DiffView;
