//! Where annotated frames go, and how the operator asks the loop to stop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use warden_core::Frame;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to write snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to publish snapshot {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives every annotated frame.
pub trait DisplaySink {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Keeps a JPEG of the latest annotated frame at a fixed path.
///
/// The file is written next to the target and renamed over it, so readers
/// never see a partial image.
#[derive(Debug)]
pub struct SnapshotDisplay {
    path: PathBuf,
    staging: PathBuf,
    every: u32,
    seen: u32,
}

impl SnapshotDisplay {
    /// Publish every `every`th frame (at least every frame).
    pub fn new(path: impl Into<PathBuf>, every: u32) -> Self {
        let path = path.into();
        let mut staging = path.clone().into_os_string();
        staging.push(".partial.jpg");
        Self {
            path,
            staging: staging.into(),
            every: every.max(1),
            seen: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for SnapshotDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let due = self.seen % self.every == 0;
        self.seen = self.seen.wrapping_add(1);
        if !due {
            return Ok(());
        }

        frame
            .image
            .save_with_format(&self.staging, image::ImageFormat::Jpeg)
            .map_err(|source| DisplayError::Snapshot {
                path: self.staging.clone(),
                source,
            })?;
        std::fs::rename(&self.staging, &self.path).map_err(|source| DisplayError::Publish {
            path: self.path.clone(),
            source,
        })
    }
}

/// Polled once per frame; `true` ends the loop.
pub trait QuitSignal {
    fn quit_requested(&self) -> bool;
}

impl QuitSignal for Arc<AtomicBool> {
    fn quit_requested(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])), 1)
    }

    #[test]
    fn test_snapshot_replaces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut display = SnapshotDisplay::new(tmp.path().join("latest.jpg"), 1);

        display.show(&frame()).unwrap();
        let decoded = image::open(display.path()).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert!(!tmp.path().join("latest.jpg.partial.jpg").exists());
    }

    #[test]
    fn test_snapshot_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latest.jpg");
        let mut display = SnapshotDisplay::new(&path, 3);

        display.show(&frame()).unwrap();
        std::fs::remove_file(&path).unwrap();
        display.show(&frame()).unwrap();
        display.show(&frame()).unwrap();
        assert!(!path.exists());
        display.show(&frame()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_snapshot_unwritable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut display = SnapshotDisplay::new(tmp.path().join("missing").join("latest.jpg"), 1);
        assert!(matches!(display.show(&frame()), Err(DisplayError::Snapshot { .. })));
    }

    #[test]
    fn test_quit_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.quit_requested());
        flag.store(true, Ordering::Relaxed);
        assert!(flag.quit_requested());
    }
}
