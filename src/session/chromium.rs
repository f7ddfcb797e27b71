//! Headless Chromium rendering session.
//!
//! Each snapshot drives one short-lived browser invocation: the page is
//! loaded, virtual time is advanced to the frame's timeline offset, and the
//! resulting surface is written out as a PNG. Keeping the engine out of
//! process means a wedged renderer can never take the sampler down with it.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use super::RenderSession;
use crate::config::SessionConfig;

/// Rendering session backed by a headless Chromium binary.
pub struct ChromiumSession {
    browser_path: PathBuf,
    source_url: String,
    width: u32,
    height: u32,
    /// Scratch root for per-snapshot browser profiles; taken on close.
    scratch: Mutex<Option<TempDir>>,
    shot_counter: AtomicU64,
}

impl ChromiumSession {
    /// Open a session against the configured content source.
    ///
    /// Verifies the content source exists and the browser binary answers
    /// `--version`. A failure here is fatal to the run; there are no
    /// retries.
    pub async fn launch(config: &SessionConfig) -> Result<Self> {
        let source = config.source.canonicalize().with_context(|| {
            format!("Content source not found: {:?}", config.source)
        })?;
        let source_url = file_url(&source);

        let output = Command::new(&config.browser_path)
            .arg("--version")
            .output()
            .await
            .with_context(|| {
                format!("Failed to run browser binary: {:?}", config.browser_path)
            })?;
        if !output.status.success() {
            anyhow::bail!(
                "Browser binary {:?} exited with {}: {}",
                config.browser_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let scratch = tempfile::tempdir().context("Failed to create session scratch directory")?;

        info!(
            "Opened rendering session: {} ({}x{}, engine: {})",
            source_url,
            config.width,
            config.height,
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(Self {
            browser_path: config.browser_path.clone(),
            source_url,
            width: config.width,
            height: config.height,
            scratch: Mutex::new(Some(scratch)),
            shot_counter: AtomicU64::new(0),
        })
    }

    fn scratch_path(&self) -> Result<PathBuf> {
        let guard = self
            .scratch
            .lock()
            .map_err(|_| anyhow::anyhow!("Session scratch lock poisoned"))?;
        let scratch = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Session is already closed"))?;
        Ok(scratch.path().to_path_buf())
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn snapshot(&self, offset: Duration) -> Result<Vec<u8>> {
        // Each invocation gets its own profile directory; concurrent
        // snapshots would otherwise fight over the profile lock.
        let shot = self.shot_counter.fetch_add(1, Ordering::Relaxed);
        let shot_dir = self.scratch_path()?.join(format!("shot-{shot}"));
        tokio::fs::create_dir(&shot_dir)
            .await
            .with_context(|| format!("Failed to create snapshot directory: {:?}", shot_dir))?;
        let shot_path = shot_dir.join("frame.png");

        let output = Command::new(&self.browser_path)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg(format!("--user-data-dir={}", shot_dir.display()))
            .arg(format!("--window-size={},{}", self.width, self.height))
            .arg(format!("--virtual-time-budget={}", offset.as_millis()))
            .arg(format!("--screenshot={}", shot_path.display()))
            .arg(&self.source_url)
            .output()
            .await
            .context("Failed to spawn browser for snapshot")?;
        if !output.status.success() {
            anyhow::bail!(
                "Snapshot render exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let bytes = tokio::fs::read(&shot_path)
            .await
            .context("Snapshot completed but produced no image")?;
        if let Err(e) = tokio::fs::remove_dir_all(&shot_dir).await {
            debug!("Could not remove snapshot directory {:?}: {}", shot_dir, e);
        }

        // The sampler assumes the surface size is fixed for the session.
        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .context("Snapshot is not a readable image")?
            .into_dimensions()
            .context("Snapshot image header is invalid")?;
        if (width, height) != (self.width, self.height) {
            anyhow::bail!(
                "Snapshot is {}x{}, expected {}x{}",
                width,
                height,
                self.width,
                self.height
            );
        }

        Ok(bytes)
    }

    /// Release the scratch directory. Safe to call once; later snapshot
    /// requests fail.
    async fn close(&self) -> Result<()> {
        let scratch = self
            .scratch
            .lock()
            .map_err(|_| anyhow::anyhow!("Session scratch lock poisoned"))?
            .take();
        if let Some(scratch) = scratch {
            scratch
                .close()
                .context("Failed to remove session scratch directory")?;
        }
        Ok(())
    }
}

/// Build a `file://` URL from an absolute filesystem path, percent-encoding
/// every byte outside the unreserved set so paths with spaces or `#` stay
/// valid URLs.
fn file_url(path: &Path) -> String {
    let mut url = String::from("file://");
    for &byte in path.to_string_lossy().as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'.' | b'_' | b'~' => {
                url.push(byte as char)
            }
            _ => url.push_str(&format!("%{byte:02X}")),
        }
    }
    url
}
