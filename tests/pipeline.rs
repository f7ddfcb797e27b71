//! End-to-end pipeline tests using a mock rendering session and a stub
//! encoder binary wired in through the configurable `ffmpeg_path`.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use wallrec::config::Config;
use wallrec::error::PipelineError;
use wallrec::pipeline::Recorder;
use wallrec::session::RenderSession;

struct MockSession;

#[async_trait]
impl RenderSession for MockSession {
    async fn snapshot(&self, offset: Duration) -> anyhow::Result<Vec<u8>> {
        Ok(format!("frame@{}ms", offset.as_millis()).into_bytes())
    }
}

/// Session that records whether the controller closed it.
struct TrackedSession {
    fail_snapshots: bool,
    closed: AtomicBool,
}

impl TrackedSession {
    fn new(fail_snapshots: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_snapshots,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl RenderSession for TrackedSession {
    async fn snapshot(&self, offset: Duration) -> anyhow::Result<Vec<u8>> {
        assert!(
            !self.closed.load(Ordering::SeqCst),
            "snapshot requested after close"
        );
        if self.fail_snapshots {
            anyhow::bail!("renderer went away");
        }
        Ok(format!("frame@{}ms", offset.as_millis()).into_bytes())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Stand-in encoder: writes its last argument (the output path).
fn stub_ffmpeg(dir: &Path) -> PathBuf {
    let stub = dir.join("ffmpeg-stub");
    std::fs::write(
        &stub,
        "#!/bin/sh\nfor last; do :; done\nprintf video > \"$last\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
    stub
}

fn test_config(workspace: &Path) -> Config {
    let mut config = Config::default();
    config.capture.duration_ms = 450;
    config.capture.interval_ms = 100;
    config.capture.frames_dir = workspace.join("screenshots");
    config.encode.ffmpeg_path = stub_ffmpeg(workspace);
    config.encode.work_file = workspace.join("wallpaper.mp4");
    config.output.dir = workspace.join("out");
    std::fs::create_dir(&config.output.dir).unwrap();
    config
}

#[tokio::test]
async fn pipeline_commits_exactly_one_new_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let out_dir = config.output.dir.clone();
    let frames_dir = config.capture.frames_dir.clone();
    std::fs::write(out_dir.join("wallpaper-3.mp4"), b"three").unwrap();
    std::fs::write(out_dir.join("wallpaper-7.mp4"), b"seven").unwrap();

    let recorder = Recorder::new(config);
    let (_tx, rx) = watch::channel(false);

    let count = recorder.sample(Arc::new(MockSession), rx).await.unwrap();
    assert!((4..=5).contains(&count), "unexpected frame count {count}");

    let committed = recorder.assemble(count).await.unwrap();
    assert_eq!(committed, out_dir.join("wallpaper-8.mp4"));
    assert_eq!(std::fs::read_to_string(&committed).unwrap(), "video");

    // Pre-existing artifacts untouched, work file renamed away.
    assert_eq!(
        std::fs::read(out_dir.join("wallpaper-3.mp4")).unwrap(),
        b"three"
    );
    assert_eq!(
        std::fs::read(out_dir.join("wallpaper-7.mp4")).unwrap(),
        b"seven"
    );
    assert!(!dir.path().join("wallpaper.mp4").exists());

    // Frame store holds exactly the contiguous range the sampler reported.
    for seq in 1..=count {
        assert!(frames_dir.join(format!("screenshot-{seq}.png")).exists());
    }
    assert!(!frames_dir
        .join(format!("screenshot-{}.png", count + 1))
        .exists());
}

#[tokio::test]
async fn session_is_closed_when_sampling_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.capture.duration_ms = 250;
    let out_dir = config.output.dir.clone();

    let session = TrackedSession::new(true);
    let recorder = Recorder::new(config);
    let (_tx, rx) = watch::channel(false);

    let err = recorder
        .run_with_session(session.clone(), rx)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Capture(_)));
    assert_eq!(err.exit_code(), 3);

    // The hardened guarantee: the session is released even though the
    // sampler aborted, and no encode ran.
    assert!(session.closed.load(Ordering::SeqCst));
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn session_is_closed_before_a_successful_encode() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let out_dir = config.output.dir.clone();

    let session = TrackedSession::new(false);
    let recorder = Recorder::new(config);
    let (_tx, rx) = watch::channel(false);

    let committed = recorder
        .run_with_session(session.clone(), rx)
        .await
        .unwrap();
    assert!(session.closed.load(Ordering::SeqCst));
    assert_eq!(committed, out_dir.join("wallpaper-1.mp4"));
}

#[tokio::test]
async fn failed_encode_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.encode.ffmpeg_path = PathBuf::from("/nonexistent/ffmpeg");
    let out_dir = config.output.dir.clone();

    let recorder = Recorder::new(config);
    let (_tx, rx) = watch::channel(false);

    let count = recorder.sample(Arc::new(MockSession), rx).await.unwrap();
    let err = recorder.assemble(count).await.unwrap_err();
    assert!(matches!(err, PipelineError::Encode(_)));
    assert_eq!(err.exit_code(), 4);

    // No artifact appeared.
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_frame_store_never_produces_a_video() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let out_dir = config.output.dir.clone();

    let recorder = Recorder::new(config);
    let err = recorder.assemble(0).await.unwrap_err();
    assert!(matches!(err, PipelineError::Encode(_)));
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

/// Round-trip against a real ffmpeg: `n` frames at `f` fps must report a
/// duration of `n / f` seconds within encoder tolerance.
/// Requires ffmpeg and ffprobe on PATH; run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn real_encode_round_trip_duration() {
    use image::{ImageBuffer, Rgb};

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.encode.ffmpeg_path = PathBuf::from("ffmpeg");
    let frames_dir = config.capture.frames_dir.clone();

    std::fs::create_dir_all(&frames_dir).unwrap();
    let frame_count = 20u64;
    for seq in 1..=frame_count {
        let shade = (seq * 12) as u8;
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(64, 64, Rgb([shade, shade, 64]));
        img.save(frames_dir.join(format!("screenshot-{seq}.png")))
            .unwrap();
    }

    let recorder = Recorder::new(config);
    let committed = recorder.assemble(frame_count).await.unwrap();

    let probe = tokio::process::Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(&committed)
        .output()
        .await
        .unwrap();
    assert!(probe.status.success());
    let duration: f64 = String::from_utf8_lossy(&probe.stdout).trim().parse().unwrap();
    // 20 frames at 10 fps.
    assert!((duration - 2.0).abs() < 0.3, "duration {duration}");
}
