//! End-to-end recording pipeline: open session, sample, encode, commit.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::encoder::Encoder;
use crate::error::PipelineError;
use crate::output;
use crate::sampler::FrameSampler;
use crate::session::{ChromiumSession, RenderSession};

/// Owns one recording session from open to committed artifact.
pub struct Recorder {
    config: Config,
}

impl Recorder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full pipeline once: open the rendering session, sample it
    /// into the frame store, close the session, encode, and commit under
    /// the next unused output name.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> Result<PathBuf, PipelineError> {
        let session: Arc<dyn RenderSession> = Arc::new(
            ChromiumSession::launch(&self.config.session)
                .await
                .map_err(PipelineError::SessionOpen)?,
        );
        self.run_with_session(session, cancel).await
    }

    /// Sample, encode and commit against an already-open session.
    ///
    /// The session is closed on every exit path, including a failed
    /// sampling run, before the result is surfaced.
    pub async fn run_with_session(
        &self,
        session: Arc<dyn RenderSession>,
        cancel: watch::Receiver<bool>,
    ) -> Result<PathBuf, PipelineError> {
        let sampled = self.sample(session.clone(), cancel).await;

        if let Err(e) = session.close().await {
            warn!("Session close failed: {:#}", e);
        }

        let frame_count = sampled?;
        self.assemble(frame_count).await
    }

    /// Sampling stage against any rendering session.
    pub async fn sample(
        &self,
        session: Arc<dyn RenderSession>,
        cancel: watch::Receiver<bool>,
    ) -> Result<u64, PipelineError> {
        FrameSampler::new(&self.config.capture)
            .sample(session, cancel)
            .await
            .map_err(PipelineError::Capture)
    }

    /// Encode the frame store and commit the artifact under the next
    /// unused output name.
    pub async fn assemble(&self, frame_count: u64) -> Result<PathBuf, PipelineError> {
        Encoder::new(&self.config.encode)
            .encode(
                &self.config.capture.frames_dir,
                frame_count,
                &self.config.encode.work_file,
            )
            .await
            .map_err(PipelineError::Encode)?;

        let target = output::next_output_name(&self.config.output.dir)
            .map_err(PipelineError::Naming)?;
        output::commit(&self.config.encode.work_file, &target)
            .map_err(PipelineError::Commit)?;

        info!("Committed output: {:?}", target);
        Ok(target)
    }
}
