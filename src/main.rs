//! wallrec binary entry point.
//!
//! Loads configuration (optional TOML path as the sole argument, plus
//! `WALLREC_*` environment overrides), runs one recording session, and
//! exits with a stage-specific code on failure.

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};

use wallrec::config::Config;
use wallrec::pipeline::Recorder;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging.level)?;

    info!("Starting wallrec v{}", VERSION);
    info!(
        "Recording {:?} for {}ms at {}ms intervals, {} fps output",
        config.session.source,
        config.capture.duration_ms,
        config.capture.interval_ms,
        config.encode.fps
    );

    // Ctrl-C stops the sampler cleanly: no new ticks, in-flight frames
    // drained, and the short frame store still gets encoded.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, finishing in-flight frames");
                let _ = cancel_tx.send(true);
            }
            Err(e) => warn!("Could not listen for interrupts: {}", e),
        }
    });

    let recorder = Recorder::new(config);
    match recorder.run(cancel_rx).await {
        Ok(path) => {
            info!("Saved video as {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
