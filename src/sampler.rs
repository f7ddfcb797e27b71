//! Fixed-duration, fixed-interval frame sampling loop.
//!
//! Ticks fire on schedule without waiting for earlier snapshots to finish,
//! so snapshot writes run concurrently and may complete out of issue order.
//! The contract downstream relies on is the completion barrier: every
//! sequence number handed out has its `screenshot-<seq>.png` fully written
//! (or its failure recorded) before `sample` returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::CaptureConfig;
use crate::session::RenderSession;

/// On-disk name of frame `seq`; the encoder regenerates the ordered input
/// list from this pattern alone, there is no separate manifest.
pub fn frame_file_name(seq: u64) -> String {
    format!("screenshot-{seq}.png")
}

/// Periodic sampler writing numbered frames into the frame store.
pub struct FrameSampler {
    frames_dir: PathBuf,
    duration: Duration,
    interval: Duration,
    snapshot_timeout: Duration,
}

impl FrameSampler {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            frames_dir: config.frames_dir.clone(),
            duration: config.duration(),
            interval: config.interval(),
            snapshot_timeout: config.snapshot_timeout(),
        }
    }

    /// Run the sampling loop until the duration elapses or `cancel` fires,
    /// then drain all in-flight snapshot writes.
    ///
    /// Returns the number of frames captured. Any snapshot failure aborts
    /// the run with an error, but only after the drain, so the frame store
    /// is never left with a write still in progress.
    pub async fn sample(
        &self,
        session: Arc<dyn RenderSession>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<u64> {
        tokio::fs::create_dir_all(&self.frames_dir)
            .await
            .with_context(|| format!("Failed to create frame store: {:?}", self.frames_dir))?;

        let mut ticker = tokio::time::interval(self.interval);
        // Consume the immediate tick so the first frame lands one interval
        // in, and measure the total duration from this point.
        ticker.tick().await;
        let deadline = tokio::time::Instant::now() + self.duration;

        let mut in_flight: JoinSet<(u64, Result<()>)> = JoinSet::new();
        let mut seq: u64 = 0;

        info!(
            "Sampling every {}ms for {}ms into {:?}",
            self.interval.as_millis(),
            self.duration.as_millis(),
            self.frames_dir
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = cancelled(&mut cancel) => {
                    info!("Cancellation requested, stopping sampling at frame {}", seq);
                    break;
                }
                _ = ticker.tick() => {
                    seq += 1;
                    self.spawn_snapshot(&mut in_flight, session.clone(), seq);
                }
            }
        }

        // Completion barrier: join every outstanding write before reporting
        // the final count.
        let mut failed = 0u64;
        let mut first_failure: Option<(u64, anyhow::Error)> = None;
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((frame, Err(e))) => {
                    error!("Frame {} failed: {:#}", frame, e);
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((frame, e));
                    }
                }
                Err(e) => {
                    error!("Snapshot task panicked: {}", e);
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((0, anyhow::anyhow!(e)));
                    }
                }
            }
        }

        if let Some((frame, e)) = first_failure {
            return Err(e.context(format!(
                "{failed} of {seq} frames failed, aborting session (first failure: frame {frame})"
            )));
        }

        info!("Captured {} frames", seq);
        Ok(seq)
    }

    fn spawn_snapshot(
        &self,
        in_flight: &mut JoinSet<(u64, Result<()>)>,
        session: Arc<dyn RenderSession>,
        seq: u64,
    ) {
        let path = self.frames_dir.join(frame_file_name(seq));
        let offset = frame_offset(self.interval, seq);
        let snapshot_timeout = self.snapshot_timeout;

        in_flight.spawn(async move {
            let attempt = tokio::time::timeout(snapshot_timeout, async {
                let bytes = session.snapshot(offset).await?;
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write frame: {:?}", path))
            })
            .await;

            let result = match attempt {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "Snapshot timed out after {}ms",
                    snapshot_timeout.as_millis()
                )),
            };
            (seq, result)
        });
    }
}

/// Timeline offset of frame `seq`: `seq` intervals after sampling start.
/// Computed in whole milliseconds so the sequence number is not truncated.
fn frame_offset(interval: Duration, seq: u64) -> Duration {
    Duration::from_millis((interval.as_millis() as u64).saturating_mul(seq))
}

/// Resolves when cancellation is requested; pends forever if the sender is
/// gone (a dropped sender must not look like a cancel).
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
