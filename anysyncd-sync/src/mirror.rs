//! Mirror primitive wrapper.
//!
//! Wraps the configured rsync-equivalent. The local snapshot loop mirrors
//! with archive + delete + checksum semantics and then runs a dry-run
//! itemize pass whose empty output is the tree-equality proof; the peer-side
//! commit staging mirror uses archive + delete only, no checksum pass.
//! The command string may carry leading arguments
//! (e.g. `rsync_command = /usr/bin/rsync --timeout=30`).

use std::path::Path;
use std::process::Output;

use tokio::process::Command;

use crate::error::SyncError;

const MIRROR_ARGS: [&str; 3] = ["-aH", "--delete", "--checksum"];
const COMMIT_ARGS: [&str; 2] = ["-aH", "--delete"];
const VERIFY_ARGS: [&str; 2] = ["--dry-run", "--itemize-changes"];

/// Split a configured command string into program and leading arguments.
pub(crate) fn split_command(command: &str) -> (String, Vec<String>) {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

/// Runner for the external mirror/compare primitive.
#[derive(Debug, Clone)]
pub struct MirrorRunner {
    program: String,
    leading_args: Vec<String>,
}

impl MirrorRunner {
    pub fn new(command: &str) -> Self {
        let (program, leading_args) = split_command(command);
        Self {
            program,
            leading_args,
        }
    }

    /// Mirror `from` into `to` (archive + delete + checksum).
    pub async fn mirror(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        self.mirror_with(&MIRROR_ARGS, from, to).await
    }

    /// Mirror `from` into `to` with archive + delete only.
    ///
    /// The commit staging mirror on peers skips the checksum comparison;
    /// only the local snapshot loop pays for it.
    pub async fn mirror_plain(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        self.mirror_with(&COMMIT_ARGS, from, to).await
    }

    async fn mirror_with(&self, args: &[&str], from: &Path, to: &Path) -> Result<(), SyncError> {
        let output = self.run(args, from, to).await?;
        if !output.status.success() {
            return Err(SyncError::MirrorFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                status: render_status(&output),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Verify that `from` and `to` are equal trees.
    ///
    /// A dry-run itemize pass over an already-mirrored pair must produce no
    /// output; any itemized line means the trees diverged again.
    pub async fn verify(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        let mut args: Vec<&str> = MIRROR_ARGS.to_vec();
        args.extend_from_slice(&VERIFY_ARGS);
        let output = self.run(&args, from, to).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let diff_lines = stdout.lines().filter(|l| !l.trim().is_empty()).count();
        if !output.status.success() || diff_lines > 0 {
            return Err(SyncError::VerifyFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                details: if diff_lines > 0 {
                    format!("{diff_lines} differing entries")
                } else {
                    render_status(&output)
                },
            });
        }
        Ok(())
    }

    /// Mirror and then verify in one step.
    pub async fn mirror_verified(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        self.mirror(from, to).await?;
        self.verify(from, to).await
    }

    async fn run(&self, args: &[&str], from: &Path, to: &Path) -> Result<Output, SyncError> {
        // Trailing slash: replicate the *contents* of `from` into `to`.
        let src = format!("{}/", from.display());
        Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .arg(&src)
            .arg(to)
            .output()
            .await
            .map_err(|e| SyncError::Spawn {
                program: self.program.clone(),
                source: e,
            })
    }
}

pub(crate) fn render_status(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit {code}"),
        None => "killed by signal".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
