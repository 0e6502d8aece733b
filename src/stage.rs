//! Per-view hunk staging state and the controller that mediates
//! stage/unstage intents against an external collaborator.
//!
//! At most one operation may be in flight per file at a time; any request
//! arriving while one is pending is rejected outright, whichever hunk it
//! targets. Completions therefore always apply to the hunk that was in
//! flight and no interleaving needs to be reconciled.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use error_set::error_set;
use tracing::{debug, warn};

use crate::patch::PatchFile;

error_set! {
    /// Failure reported by a staging collaborator
    CollaboratorError := {
        /// The backend rejected or failed the operation
        #[display("staging backend failed: {reason}")]
        Backend { reason: String },
    }

    /// Errors from hunk stage/unstage requests
    StageError := {
        /// Another operation is still in flight for this file
        #[display("operation already in flight for hunk {pending}")]
        OperationInFlight { pending: usize },
        /// Hunk index outside the parsed patch
        #[display("no hunk at index {index}")]
        UnknownHunk { index: usize },
        /// Stage requested for a hunk that is already staged
        #[display("hunk {index} is already staged")]
        AlreadyStaged { index: usize },
        /// Unstage requested for a hunk that is not staged
        #[display("hunk {index} is not staged")]
        NotStaged { index: usize },
    } || CollaboratorError
}

/// External staging collaborator.
///
/// Operates on re-serialized unified-diff text, not on the structured
/// model. Implementations must be cancel-free: a call that was issued is
/// allowed to settle even if its result ends up discarded.
#[async_trait]
pub trait HunkStager: Send + Sync {
    async fn stage_hunk(
        &self,
        file_path: &str,
        hunk_patch_text: &str,
    ) -> Result<(), CollaboratorError>;

    async fn unstage_hunk(
        &self,
        file_path: &str,
        hunk_patch_text: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Staging state for one open diff view.
///
/// Keyed by hunk index, which is positional: re-parsing the patch
/// invalidates every index, so the state resets wholesale on re-parse.
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingState {
    /// Hunks whose stage operation has succeeded
    pub staged: BTreeSet<usize>,
    /// The hunk with an operation currently in flight, if any
    pub in_flight: Option<usize>,
    /// Hunk under the pointer; gates which row controls are interactive
    pub hovered: Option<usize>,
}

enum Op {
    Stage,
    Unstage,
}

/// Mediates stage/unstage intents for one file against a collaborator.
///
/// Single writer: all state mutation goes through the controller. The
/// lock is never held across an await.
pub struct StagingController<S> {
    state: Mutex<StagingState>,
    stager: S,
}

impl<S: HunkStager> StagingController<S> {
    pub fn new(stager: S) -> Self {
        Self {
            state: Mutex::new(StagingState::default()),
            stager,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StagingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The collaborator this controller drives
    #[must_use]
    pub fn stager(&self) -> &S {
        &self.stager
    }

    /// Snapshot of the current staging state
    #[must_use]
    pub fn state(&self) -> StagingState {
        self.lock().clone()
    }

    pub fn set_hovered(&self, hunk: Option<usize>) {
        self.lock().hovered = hunk;
    }

    /// Reset everything; required whenever the patch is re-parsed since
    /// hunk indices are not stable across parses.
    pub fn reset(&self) {
        *self.lock() = StagingState::default();
    }

    /// Stage hunk `index` of `file`. Rejected while any operation is in
    /// flight or when the hunk is already staged; on collaborator failure
    /// the staged set is untouched and the hunk returns to its
    /// pre-operation state so the user may retry.
    pub async fn stage(&self, file: &PatchFile, index: usize) -> Result<(), StageError> {
        let patch_text = self.begin(file, index, Op::Stage)?;
        debug!(path = file.path(), index, "staging hunk");
        let result = self.stager.stage_hunk(file.path(), &patch_text).await;
        self.settle(index, Op::Stage, result)
    }

    /// Unstage hunk `index` of `file`. Same guard shape as [`Self::stage`];
    /// on success the hunk leaves the staged set.
    pub async fn unstage(&self, file: &PatchFile, index: usize) -> Result<(), StageError> {
        let patch_text = self.begin(file, index, Op::Unstage)?;
        debug!(path = file.path(), index, "unstaging hunk");
        let result = self.stager.unstage_hunk(file.path(), &patch_text).await;
        self.settle(index, Op::Unstage, result)
    }

    /// Guard checks and transition into the in-flight state. Returns the
    /// serialized hunk patch text for the collaborator call.
    fn begin(&self, file: &PatchFile, index: usize, op: Op) -> Result<String, StageError> {
        let mut state = self.lock();

        if let Some(pending) = state.in_flight {
            return Err(StageError::OperationInFlight { pending });
        }
        let Some(hunk) = file.hunks.get(index) else {
            return Err(StageError::UnknownHunk { index });
        };
        match op {
            Op::Stage if state.staged.contains(&index) => {
                return Err(StageError::AlreadyStaged { index });
            }
            Op::Unstage if !state.staged.contains(&index) => {
                return Err(StageError::NotStaged { index });
            }
            _ => {}
        }

        state.in_flight = Some(index);
        Ok(hunk.to_string())
    }

    /// Clear the in-flight marker and apply the outcome. The staged set
    /// changes only on success.
    fn settle(
        &self,
        index: usize,
        op: Op,
        result: Result<(), CollaboratorError>,
    ) -> Result<(), StageError> {
        let mut state = self.lock();
        state.in_flight = None;

        match result {
            Ok(()) => {
                match op {
                    Op::Stage => {
                        state.staged.insert(index);
                    }
                    Op::Unstage => {
                        state.staged.remove(&index);
                    }
                }
                Ok(())
            }
            Err(err) => {
                warn!(index, error = %err, "hunk operation failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::patch::parse_patch;
    use similar_asserts::assert_eq;

    /// Collaborator that records calls and answers from a script
    struct ScriptedStager {
        fail_next: std::sync::atomic::AtomicBool,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl ScriptedStager {
        fn new() -> Self {
            Self {
                fail_next: std::sync::atomic::AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(&self, op: &str, path: &str, patch: &str) -> Result<(), CollaboratorError> {
            self.calls.lock().unwrap().push((
                op.to_string(),
                path.to_string(),
                patch.to_string(),
            ));
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                Err(CollaboratorError::Backend {
                    reason: "scripted failure".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl HunkStager for ScriptedStager {
        async fn stage_hunk(&self, path: &str, patch: &str) -> Result<(), CollaboratorError> {
            self.answer("stage", path, patch)
        }

        async fn unstage_hunk(&self, path: &str, patch: &str) -> Result<(), CollaboratorError> {
            self.answer("unstage", path, patch)
        }
    }

    fn two_hunk_file() -> PatchFile {
        parse_patch(
            "--- a/demo.rs\n+++ b/demo.rs\n@@ -1,1 +1,1 @@\n-a\n+A\n@@ -9,1 +9,2 @@\n b\n+c\n",
        )
        .remove(0)
    }

    #[tokio::test]
    async fn stage_success_updates_state() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        ctrl.stage(&file, 0).await.unwrap();

        let state = ctrl.state();
        assert_eq!(state.staged, [0].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(state.in_flight, None);
    }

    #[tokio::test]
    async fn stage_passes_serialized_hunk_to_collaborator() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        ctrl.stage(&file, 1).await.unwrap();

        let calls = ctrl.stager.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "stage");
        assert_eq!(calls[0].1, "b/demo.rs");
        assert_eq!(calls[0].2, "@@ -9,1 +9,2 @@\n b\n+c\n");
    }

    #[tokio::test]
    async fn stage_failure_leaves_staged_set_untouched() {
        let stager = ScriptedStager::new();
        stager.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
        let ctrl = StagingController::new(stager);
        let file = two_hunk_file();

        let err = ctrl.stage(&file, 0).await.unwrap_err();
        assert!(matches!(err, StageError::Backend { .. }));

        let state = ctrl.state();
        assert!(state.staged.is_empty());
        assert_eq!(state.in_flight, None);
    }

    #[tokio::test]
    async fn failed_hunk_can_be_retried() {
        let stager = ScriptedStager::new();
        stager.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
        let ctrl = StagingController::new(stager);
        let file = two_hunk_file();

        assert!(ctrl.stage(&file, 0).await.is_err());
        ctrl.stage(&file, 0).await.unwrap();
        assert!(ctrl.state().staged.contains(&0));
    }

    #[tokio::test]
    async fn unstage_removes_from_staged_set() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        ctrl.stage(&file, 0).await.unwrap();
        ctrl.unstage(&file, 0).await.unwrap();

        assert!(ctrl.state().staged.is_empty());
    }

    #[tokio::test]
    async fn redundant_requests_are_rejected() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        let err = ctrl.unstage(&file, 0).await.unwrap_err();
        assert!(matches!(err, StageError::NotStaged { index: 0 }));

        ctrl.stage(&file, 0).await.unwrap();
        let err = ctrl.stage(&file, 0).await.unwrap_err();
        assert!(matches!(err, StageError::AlreadyStaged { index: 0 }));

        // Only the successful stage reached the collaborator.
        assert_eq!(ctrl.stager.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_index_is_rejected_without_collaborator_call() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        let err = ctrl.stage(&file, 7).await.unwrap_err();
        assert!(matches!(err, StageError::UnknownHunk { index: 7 }));
        assert!(ctrl.stager.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let ctrl = StagingController::new(ScriptedStager::new());
        let file = two_hunk_file();

        ctrl.stage(&file, 0).await.unwrap();
        ctrl.set_hovered(Some(1));
        ctrl.reset();

        assert_eq!(ctrl.state(), StagingState::default());
    }

    #[test]
    fn hovered_is_plain_presentation_state() {
        let ctrl = StagingController::new(ScriptedStager::new());
        ctrl.set_hovered(Some(2));
        assert_eq!(ctrl.state().hovered, Some(2));
        ctrl.set_hovered(None);
        assert_eq!(ctrl.state().hovered, None);
    }
}
