//! Controller integration tests against an in-memory collaborator.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use patchview::patch::{PatchFile, parse_patch};
use patchview::stage::{CollaboratorError, HunkStager, StageError, StagingController};

/// Collaborator that holds every call open long enough for a competing
/// request to arrive while the first is still in flight.
struct DelayedStager {
    delay: Duration,
    calls: Mutex<Vec<(String, String)>>,
}

impl DelayedStager {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, op: &str, path: &str) -> Result<(), CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), path.to_string()));
        Ok(())
    }
}

#[async_trait]
impl HunkStager for DelayedStager {
    async fn stage_hunk(&self, path: &str, _patch: &str) -> Result<(), CollaboratorError> {
        self.record("stage", path).await
    }

    async fn unstage_hunk(&self, path: &str, _patch: &str) -> Result<(), CollaboratorError> {
        self.record("unstage", path).await
    }
}

fn two_hunk_file() -> PatchFile {
    parse_patch(
        "--- a/sample.rs\n+++ b/sample.rs\n\
         @@ -1,2 +1,2 @@\n-fn one() {}\n+fn one() -> u8 { 1 }\n // keep\n\
         @@ -8,1 +8,2 @@\n fn two() {}\n+fn three() {}\n",
    )
    .remove(0)
}

#[tokio::test]
async fn second_stage_while_first_in_flight_is_rejected() {
    let ctrl = StagingController::new(DelayedStager::new(Duration::from_millis(50)));
    let file = two_hunk_file();

    let (first, second) = tokio::join!(ctrl.stage(&file, 0), ctrl.stage(&file, 1));

    first.expect("first stage should settle successfully");
    let err = second.expect_err("second stage should be rejected");
    assert!(matches!(err, StageError::OperationInFlight { pending: 0 }));

    let state = ctrl.state();
    assert_eq!(state.staged.into_iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(state.in_flight, None);
}

#[tokio::test]
async fn guard_applies_to_the_whole_file_not_just_the_hunk() {
    let ctrl = StagingController::new(DelayedStager::new(Duration::from_millis(50)));
    let file = two_hunk_file();

    // Same target hunk: still rejected while the first is pending.
    let (first, second) = tokio::join!(ctrl.stage(&file, 0), ctrl.stage(&file, 0));

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(StageError::OperationInFlight { pending: 0 })
    ));
}

#[tokio::test]
async fn unstage_is_also_rejected_while_staging_is_in_flight() {
    let ctrl = StagingController::new(DelayedStager::new(Duration::from_millis(50)));
    let file = two_hunk_file();

    let (first, second) = tokio::join!(ctrl.stage(&file, 1), ctrl.unstage(&file, 1));

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(StageError::OperationInFlight { pending: 1 })
    ));
}

#[tokio::test]
async fn sequential_lifecycle_reaches_the_collaborator_in_order() {
    let ctrl = StagingController::new(DelayedStager::new(Duration::from_millis(1)));
    let file = two_hunk_file();

    ctrl.stage(&file, 0).await.expect("stage hunk 0");
    ctrl.stage(&file, 1).await.expect("stage hunk 1");
    ctrl.unstage(&file, 0).await.expect("unstage hunk 0");

    let calls = ctrl.state();
    assert_eq!(calls.staged.into_iter().collect::<Vec<_>>(), vec![1]);

    let log = ctrl_calls(&ctrl);
    assert_eq!(
        log,
        vec![
            ("stage".to_string(), "b/sample.rs".to_string()),
            ("stage".to_string(), "b/sample.rs".to_string()),
            ("unstage".to_string(), "b/sample.rs".to_string()),
        ]
    );
}

fn ctrl_calls(ctrl: &StagingController<DelayedStager>) -> Vec<(String, String)> {
    ctrl_stager(ctrl).calls.lock().unwrap().clone()
}

fn ctrl_stager(ctrl: &StagingController<DelayedStager>) -> &DelayedStager {
    // The controller owns the collaborator; tests reach it through the
    // public accessor.
    ctrl.stager()
}

#[tokio::test]
async fn rejection_does_not_disturb_later_requests() {
    let ctrl = StagingController::new(DelayedStager::new(Duration::from_millis(30)));
    let file = two_hunk_file();

    let (first, second) = tokio::join!(ctrl.stage(&file, 0), ctrl.stage(&file, 1));
    assert!(first.is_ok());
    assert!(second.is_err());

    // Once the in-flight operation settled, the previously rejected hunk
    // can be staged normally.
    ctrl.stage(&file, 1).await.expect("retry after rejection");
    assert_eq!(
        ctrl.state().staged.into_iter().collect::<Vec<_>>(),
        vec![0, 1]
    );
}
