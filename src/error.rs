//! Pipeline error taxonomy with stage-specific exit codes.

use thiserror::Error;

/// A failure in one stage of the recording pipeline.
///
/// Each variant corresponds to one stage boundary, so the process can exit
/// with a distinct code per failure kind.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The rendering session could not be started or the content source
    /// could not be loaded. Nothing was captured.
    #[error("failed to open rendering session: {0:#}")]
    SessionOpen(#[source] anyhow::Error),

    /// One or more frame snapshots failed; the session was aborted after
    /// draining in-flight writes.
    #[error("frame capture failed: {0:#}")]
    Capture(#[source] anyhow::Error),

    /// The batch encode reported an error; no partial video is committed.
    #[error("video encode failed: {0:#}")]
    Encode(#[source] anyhow::Error),

    /// The output directory could not be scanned for existing artifacts.
    #[error("output naming failed: {0:#}")]
    Naming(#[source] anyhow::Error),

    /// Renaming the intermediate video to its final name failed; the
    /// intermediate file is left in place for manual recovery.
    #[error("output commit failed: {0:#}")]
    Commit(#[source] anyhow::Error),
}

impl PipelineError {
    /// Process exit code for this failure stage.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::SessionOpen(_) => 2,
            PipelineError::Capture(_) => 3,
            PipelineError::Encode(_) => 4,
            PipelineError::Naming(_) => 5,
            PipelineError::Commit(_) => 6,
        }
    }
}
