use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use warden_core::{AlertThrottle, FaceMatcher, Frame, Gallery, OnnxAnalyzer, RecordingSession};
use warden_hw::{
    Camera, CameraCapture, CameraError, CaptureSource, DisplaySink, FfmpegEvidenceSink, HeadlessDisplay,
    OverlayRenderer, ReplayError, ReplaySource, SnapshotDisplay,
};

mod config;
mod engine;
mod notify;

use config::Config;
use engine::{RunSummary, StopReason, SystemClock, WatchLoop};
use notify::TwilioNotifier;

#[derive(Parser)]
#[command(name = "wardend", about = "Watches a camera for unknown faces, records evidence and sends alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watch loop
    Run {
        /// Read frames from a directory of images instead of the camera
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Enrollment directory (overrides WARDEN_KNOWN_FACES_DIR)
        #[arg(long)]
        known_faces: Option<PathBuf>,
        /// Evidence directory (overrides WARDEN_OUTPUT_DIR)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load the enrollment gallery and list identities
    Gallery {
        /// Enrollment directory (overrides WARDEN_KNOWN_FACES_DIR)
        #[arg(long)]
        known_faces: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Run {
            replay,
            known_faces,
            output,
        } => {
            if let Some(dir) = known_faces {
                config.known_faces_dir = dir;
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            let summary = run(config, replay).await?;
            println!(
                "{} frames, {} recordings, {} alerts sent, {} alerts failed ({:?})",
                summary.frames, summary.recordings, summary.alerts_sent, summary.alerts_failed, summary.reason
            );
        }
        Commands::Gallery { known_faces } => {
            if let Some(dir) = known_faces {
                config.known_faces_dir = dir;
            }
            let (_, gallery) = load_gallery(&config)?;
            if gallery.is_empty() {
                println!("No identities enrolled in {}", config.known_faces_dir.display());
            }
            for (name, images) in gallery.identities() {
                println!("{name}: {images} image(s)");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} (driver: {}, bus: {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

fn load_gallery(config: &Config) -> Result<(OnnxAnalyzer, Gallery)> {
    let mut analyzer = OnnxAnalyzer::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .with_context(|| format!("failed to load face models from {}", config.model_dir.display()))?;
    tracing::info!(dir = %config.model_dir.display(), "face models loaded");

    let gallery = Gallery::load(&config.known_faces_dir, &mut analyzer)
        .with_context(|| format!("failed to load known faces from {}", config.known_faces_dir.display()))?;
    Ok((analyzer, gallery))
}

async fn run(config: Config, replay: Option<PathBuf>) -> Result<RunSummary> {
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create output directory {}", config.output_dir.display()))?;

    if config.tolerance_is_strict() {
        tracing::warn!(
            tolerance = config.tolerance,
            "match tolerance is tight for normalized ArcFace embeddings; enrolled people may be reported as unknown \
             (raise WARDEN_TOLERANCE, e.g. to 1.0)"
        );
    }

    let (analyzer, gallery) = load_gallery(&config)?;
    if gallery.is_empty() {
        tracing::warn!("gallery is empty; every face will be treated as unknown");
    }

    let notifier = config
        .twilio
        .as_ref()
        .map(|twilio| TwilioNotifier::new(twilio, config.alert_timeout));
    if notifier.is_none() {
        tracing::warn!("Twilio is not configured; alerts will be logged as failed");
    }

    let overlay = OverlayRenderer::load(config.font_path.as_deref()).context("failed to load overlay font")?;
    let mut display: Box<dyn DisplaySink + Send> = match &config.snapshot_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "publishing annotated snapshots");
            Box::new(SnapshotDisplay::new(path, 1))
        }
        None => Box::new(HeadlessDisplay),
    };

    let watch = WatchLoop::new(
        analyzer,
        gallery,
        FaceMatcher::new(config.tolerance, config.min_size),
        RecordingSession::new(
            FfmpegEvidenceSink,
            &config.output_dir,
            config.record_buffer,
            config.record_fps,
        ),
        AlertThrottle::new(notifier, config.alert_cooldown),
        overlay,
    );

    let quit = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = oneshot::channel();

    let loop_quit = Arc::clone(&quit);
    std::thread::Builder::new()
        .name("warden-loop".into())
        .spawn(move || {
            let result = FrameSource::open(&config, replay.as_deref())
                .map(|source| watch.run(source, display.as_mut(), &loop_quit, &SystemClock));
            let _ = done_tx.send(result);
        })
        .context("failed to spawn watch loop thread")?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current frame");
            quit.store(true, Ordering::Relaxed);
        }
    });

    let summary = done_rx.await.context("watch loop thread exited without reporting")??;
    if summary.reason == StopReason::CaptureFailed {
        tracing::warn!("stopped because the capture source failed");
    }
    Ok(summary)
}

#[derive(Error, Debug)]
enum SourceError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// The live camera or a replayed image directory.
enum FrameSource {
    Camera(CameraCapture),
    Replay(ReplaySource),
}

impl FrameSource {
    fn open(config: &Config, replay: Option<&Path>) -> Result<Self, SourceError> {
        match replay {
            Some(dir) => {
                let interval = (config.record_fps > 0.0).then(|| Duration::from_secs_f64(1.0 / config.record_fps));
                Ok(Self::Replay(ReplaySource::open(dir, interval)?))
            }
            None => {
                let camera = Camera::open(&config.camera_device, config.camera_width, config.camera_height)?;
                Ok(Self::Camera(camera.into_capture()?))
            }
        }
    }
}

impl CaptureSource for FrameSource {
    type Error = SourceError;

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        match self {
            Self::Camera(camera) => Ok(camera.read()?),
            Self::Replay(replay) => Ok(replay.read()?),
        }
    }
}
