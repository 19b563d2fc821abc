//! Frame sources for the watch loop.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use warden_core::Frame;

/// Produces frames one at a time. `Ok(None)` means the stream has ended.
///
/// Dropping the source releases the underlying device or files.
pub trait CaptureSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn read(&mut self) -> Result<Option<Frame>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("replay directory {path} is not readable: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode replay frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Replays a directory of still images (sorted by file name) as a stream.
///
/// With an interval set, frames are released no faster than that pace so
/// time-based behaviour matches a live camera.
pub struct ReplaySource {
    frames: std::vec::IntoIter<PathBuf>,
    interval: Option<Duration>,
    next_due: Option<Instant>,
    sequence: u32,
}

impl ReplaySource {
    pub fn open(dir: &Path, interval: Option<Duration>) -> Result<Self, ReplayError> {
        let to_err = |source| ReplayError::Directory {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(to_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), "opened replay source");

        Ok(Self {
            frames: paths.into_iter(),
            interval,
            next_due: None,
            sequence: 0,
        })
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.map_or(now, |due| due.max(now)) + interval);
    }
}

impl CaptureSource for ReplaySource {
    type Error = ReplayError;

    fn read(&mut self) -> Result<Option<Frame>, ReplayError> {
        let Some(path) = self.frames.next() else {
            return Ok(None);
        };
        self.pace();

        let image = image::open(&path)
            .map_err(|source| ReplayError::Decode { path, source })?
            .to_rgb8();
        self.sequence += 1;
        Ok(Some(Frame::new(image, self.sequence)))
    }
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ["jpg", "jpeg", "png"].iter().any(|ok| e.eq_ignore_ascii_case(ok)))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_replay_yields_sorted_frames_then_ends() {
        let tmp = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 2, Rgb([2, 0, 0])).save(tmp.path().join("0002.png")).unwrap();
        RgbImage::from_pixel(4, 2, Rgb([1, 0, 0])).save(tmp.path().join("0001.png")).unwrap();
        std::fs::write(tmp.path().join("readme.txt"), "skip me").unwrap();

        let mut source = ReplaySource::open(tmp.path(), None).unwrap();

        let first = source.read().unwrap().unwrap();
        assert_eq!(first.image.get_pixel(0, 0)[0], 1);
        assert_eq!(first.sequence, 1);
        let second = source.read().unwrap().unwrap();
        assert_eq!(second.image.get_pixel(0, 0)[0], 2);
        assert!(source.read().unwrap().is_none());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_replay_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplaySource::open(&tmp.path().join("missing"), None),
            Err(ReplayError::Directory { .. })
        ));
    }

    #[test]
    fn test_replay_paces_frames() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..3 {
            RgbImage::new(2, 2).save(tmp.path().join(format!("{i}.png"))).unwrap();
        }
        let mut source = ReplaySource::open(tmp.path(), Some(Duration::from_millis(20))).unwrap();

        let start = Instant::now();
        while source.read().unwrap().is_some() {}
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
