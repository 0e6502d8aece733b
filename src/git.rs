//! Staging collaborator backed by `git apply --cached`.
//!
//! The engine itself never touches a repository; this adapter re-wraps a
//! hunk's serialized patch text with file headers and pipes it to git,
//! applying in reverse to unstage.

use std::process::Stdio;

use async_trait::async_trait;
use error_set::error_set;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::stage::{CollaboratorError, HunkStager};

error_set! {
    /// Errors from running git apply
    GitApplyError := {
        #[display("failed to spawn git apply: {message}")]
        SpawnFailed { message: String },
        #[display("failed to get stdin handle for git apply")]
        StdinUnavailable,
        #[display("failed to write patch to git apply: {message}")]
        WriteFailed { message: String },
        #[display("failed to wait for git apply: {message}")]
        WaitFailed { message: String },
        #[display("git apply failed: {stderr}")]
        ExitError { stderr: String },
    }
}

/// Applies hunk patches to the index of the repository at `repo_path`
pub struct GitIndexStager {
    repo_path: String,
}

impl GitIndexStager {
    pub fn new(repo_path: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Wrap serialized hunk text into a patch git will accept: file
    /// headers first, with any `a/`/`b/` prefix reduced to the bare path.
    fn full_patch(file_path: &str, hunk_patch_text: &str) -> String {
        let path = file_path
            .strip_prefix("a/")
            .or_else(|| file_path.strip_prefix("b/"))
            .unwrap_or(file_path);
        format!("--- a/{path}\n+++ b/{path}\n{hunk_patch_text}")
    }

    async fn apply(&self, reverse: bool, patch: &str) -> Result<(), GitApplyError> {
        let mut args = vec![
            "-C",
            self.repo_path.as_str(),
            "apply",
            "--cached",
            "--unidiff-zero",
        ];
        if reverse {
            args.push("--reverse");
        }
        args.push("-");

        debug!(repo = %self.repo_path, reverse, "running git apply");

        let mut child = Command::new("git")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitApplyError::SpawnFailed {
                message: e.to_string(),
            })?;

        let mut stdin = child.stdin.take().ok_or(GitApplyError::StdinUnavailable)?;
        stdin
            .write_all(patch.as_bytes())
            .await
            .map_err(|e| GitApplyError::WriteFailed {
                message: e.to_string(),
            })?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| GitApplyError::WaitFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitApplyError::ExitError {
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl HunkStager for GitIndexStager {
    async fn stage_hunk(
        &self,
        file_path: &str,
        hunk_patch_text: &str,
    ) -> Result<(), CollaboratorError> {
        let patch = Self::full_patch(file_path, hunk_patch_text);
        self.apply(false, &patch)
            .await
            .map_err(|e| CollaboratorError::Backend {
                reason: e.to_string(),
            })
    }

    async fn unstage_hunk(
        &self,
        file_path: &str,
        hunk_patch_text: &str,
    ) -> Result<(), CollaboratorError> {
        let patch = Self::full_patch(file_path, hunk_patch_text);
        self.apply(true, &patch)
            .await
            .map_err(|e| CollaboratorError::Backend {
                reason: e.to_string(),
            })
    }
}
