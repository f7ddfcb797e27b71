//! Batch video encode of the numbered frame store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::info;

use crate::config::EncodeConfig;
use crate::sampler::frame_file_name;

/// One-shot ffmpeg encoder turning the frame store into the intermediate
/// video file.
pub struct Encoder {
    ffmpeg_path: PathBuf,
    fps: u32,
}

impl Encoder {
    pub fn new(config: &EncodeConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            fps: config.fps,
        }
    }

    /// Encode frames `1..=frame_count` into `work_file` in a single batch
    /// call at the configured frame rate.
    ///
    /// The whole encode fails if any input frame is missing; nothing is
    /// partially committed.
    pub async fn encode(
        &self,
        frames_dir: &Path,
        frame_count: u64,
        work_file: &Path,
    ) -> Result<()> {
        if frame_count == 0 {
            anyhow::bail!("Frame store is empty, nothing to encode");
        }
        verify_frames(frames_dir, frame_count)?;

        info!(
            "Encoding {} frames at {} fps into {:?}",
            frame_count, self.fps, work_file
        );

        let args = encode_args(frames_dir, frame_count, self.fps, work_file);
        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run encoder: {:?}", self.ffmpeg_path))?;
        if !output.status.success() {
            anyhow::bail!(
                "Encoder exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Check the generated input list `screenshot-1.png ..= screenshot-<n>.png`
/// against the frame store. The list comes from the numeric naming
/// contract, never from directory listing order.
fn verify_frames(frames_dir: &Path, frame_count: u64) -> Result<()> {
    for seq in 1..=frame_count {
        let path = frames_dir.join(frame_file_name(seq));
        if !path.is_file() {
            anyhow::bail!(
                "Frame store is missing {:?} ({} frames expected)",
                path,
                frame_count
            );
        }
    }
    Ok(())
}

/// Arguments for the single batch invocation. Inputs are addressed through
/// the numeric `%d` pattern with an explicit start number and frame count,
/// so ffmpeg consumes them in strict ascending sequence order.
fn encode_args(frames_dir: &Path, frame_count: u64, fps: u32, work_file: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-framerate".into(),
        fps.to_string(),
        "-start_number".into(),
        "1".into(),
        "-i".into(),
        frames_dir.join("screenshot-%d.png").display().to_string(),
        "-frames:v".into(),
        frame_count.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        work_file.display().to_string(),
    ]
}
