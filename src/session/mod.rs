//! Rendering session abstraction with a headless-browser backend.

mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One open rendering session against a fixed content source.
///
/// The surface dimensions are fixed for the session's lifetime, so every
/// snapshot has the same pixel size. Snapshots may be requested
/// concurrently; implementations must be safe to call from multiple tasks.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Capture one PNG snapshot of the rendering surface.
    ///
    /// `offset` is the frame's position on the content timeline, measured
    /// from the start of sampling, so frame content is a deterministic
    /// function of its sequence number.
    async fn snapshot(&self, offset: Duration) -> Result<Vec<u8>>;

    /// Release session resources. The controller calls this exactly once
    /// after sampling, on success and failure alike; snapshots must not be
    /// requested afterwards.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub use chromium::ChromiumSession;
