//! One open diff view: cached parse result, memoized projections, and the
//! staging facade.
//!
//! The original shell recomputed these views through fine-grained signal
//! tracking; here the triggers are explicit instead: `update` re-parses
//! when the input text changes, projections recompute from the cached
//! parse result, and the memoized copies are dropped whenever the text
//! (and therefore the hunk index space) changes.

use std::collections::HashMap;

use tracing::debug;

use crate::patch::{self, PatchFile};
use crate::render::{self, SplitRow, UnifiedLine};
use crate::stage::{HunkStager, StageError, StagingController, StagingState};

/// A per-view instance over one file's diff text.
///
/// Owns its own staging state; nothing here is global, so each open view
/// tracks hover and in-flight hunks independently.
pub struct DiffView<S> {
    patch: Option<PatchFile>,
    controller: StagingController<S>,
    unified: Option<Vec<UnifiedLine>>,
    split: HashMap<usize, Vec<SplitRow>>,
}

impl<S: HunkStager> DiffView<S> {
    /// Parse `diff_text` and open a view over its first file section.
    ///
    /// Parse failures follow the parser's fail-soft contract: the view
    /// simply has nothing to show.
    pub fn open(diff_text: &str, stager: S) -> Self {
        let mut files = patch::parse_patch(diff_text);
        if files.len() > 1 {
            debug!(extra = files.len() - 1, "diff view opened on multi-file text; using first section");
        }
        let patch = if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        };

        Self {
            patch,
            controller: StagingController::new(stager),
            unified: None,
            split: HashMap::new(),
        }
    }

    /// Replace the diff text, e.g. after the working tree changed.
    ///
    /// Re-parsing invalidates the hunk index space, so the staging state
    /// and every memoized projection reset with it.
    pub fn update(&mut self, diff_text: &str) {
        let mut files = patch::parse_patch(diff_text);
        self.patch = if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        };
        self.controller.reset();
        self.unified = None;
        self.split.clear();
    }

    #[must_use]
    pub fn patch(&self) -> Option<&PatchFile> {
        self.patch.as_ref()
    }

    #[must_use]
    pub fn hunk_count(&self) -> usize {
        self.patch.as_ref().map_or(0, |p| p.hunks.len())
    }

    /// Unified projection with staged flags stamped from current state.
    ///
    /// The base projection is memoized; the per-hunk staged annotation is
    /// re-applied on every read since it changes independently.
    pub fn unified(&mut self) -> Vec<UnifiedLine> {
        let Some(patch) = &self.patch else {
            return Vec::new();
        };

        let base = self
            .unified
            .get_or_insert_with(|| render::unified_lines(patch, None));

        let staged = self.controller.state().staged;
        let mut lines = base.clone();
        for entry in &mut lines {
            if let Some(index) = entry.hunk {
                entry.staged = staged.contains(&index);
            }
        }
        lines
    }

    /// Split projection for one hunk, memoized per index
    pub fn split(&mut self, index: usize) -> Vec<SplitRow> {
        let Some(patch) = &self.patch else {
            return Vec::new();
        };
        let Some(hunk) = patch.hunks.get(index) else {
            return Vec::new();
        };

        self.split
            .entry(index)
            .or_insert_with(|| render::split_rows(hunk))
            .clone()
    }

    pub fn hover(&self, hunk: Option<usize>) {
        self.controller.set_hovered(hunk);
    }

    /// Snapshot of the staging state for rendering row controls
    #[must_use]
    pub fn staging(&self) -> StagingState {
        self.controller.state()
    }

    pub async fn stage(&self, index: usize) -> Result<(), StageError> {
        let Some(patch) = &self.patch else {
            return Err(StageError::UnknownHunk { index });
        };
        self.controller.stage(patch, index).await
    }

    pub async fn unstage(&self, index: usize) -> Result<(), StageError> {
        let Some(patch) = &self.patch else {
            return Err(StageError::UnknownHunk { index });
        };
        self.controller.unstage(patch, index).await
    }
}
