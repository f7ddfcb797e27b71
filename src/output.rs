//! Collision-free output naming and final commit.
//!
//! The output name sequence has no in-memory or persisted counter; it is
//! recomputed by scanning the output directory each run. Two concurrent
//! runs against the same directory can race — single-writer is assumed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

const OUTPUT_PREFIX: &str = "wallpaper-";
const OUTPUT_SUFFIX: &str = ".mp4";

/// Compute the next unused `wallpaper-<n>.mp4` path in `dir`.
///
/// `<n>` is one greater than the maximum number among existing well-formed
/// artifact names (an empty directory yields `wallpaper-1.mp4`). Malformed
/// near-matches are skipped with a warning rather than failing the run.
/// Pure function of the directory contents at call time.
pub fn next_output_name(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to scan output directory: {:?}", dir))?;

    let mut max = 0u64;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {:?}", dir))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        match parse_output_number(name) {
            Some(n) => max = max.max(n),
            None if name.starts_with(OUTPUT_PREFIX) && name.ends_with(OUTPUT_SUFFIX) => {
                warn!("Ignoring malformed artifact name: {}", name);
            }
            None => {}
        }
    }

    Ok(dir.join(format!("{OUTPUT_PREFIX}{}{OUTPUT_SUFFIX}", max + 1)))
}

/// Extract `<n>` from a well-formed `wallpaper-<n>.mp4` name.
fn parse_output_number(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(OUTPUT_PREFIX)?
        .strip_suffix(OUTPUT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Rename the intermediate video to its final, collision-free name.
///
/// Refuses an already-existing target instead of overwriting it. On any
/// failure the intermediate file is left in place for manual recovery.
pub fn commit(work_file: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        anyhow::bail!("Output name already taken: {:?}", target);
    }
    std::fs::rename(work_file, target)
        .with_context(|| format!("Failed to rename {:?} to {:?}", work_file, target))
}
