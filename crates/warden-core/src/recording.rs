//! Evidence recording state machine.
//!
//! INACTIVE → ACTIVE on the first frame with an unknown face; stays ACTIVE
//! through gaps up to the buffer window; ACTIVE → INACTIVE once no unknown
//! face has been seen for longer than the window. The writer handle lives
//! inside the ACTIVE state, so "has a writer" and "is recording" cannot
//! disagree.

use crate::frame::Frame;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default quiet period before a recording is closed.
pub const DEFAULT_RECORD_BUFFER: Duration = Duration::from_secs(5);
/// Frame rate written into evidence files.
pub const DEFAULT_RECORD_FPS: f64 = 20.0;

/// Error type reported by evidence backends.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Opens evidence files.
pub trait EvidenceSink {
    type Writer: EvidenceWriter;

    fn open(&mut self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Self::Writer, SinkError>;
}

/// An open evidence file. `close` consumes the handle, so it can only be
/// released once.
pub trait EvidenceWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;

    fn close(self) -> Result<(), SinkError>;
}

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("failed to open evidence file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("failed to write to evidence file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("failed to finalize evidence file {path}: {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
}

/// A recording that has been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    pub path: PathBuf,
    pub frames: u64,
}

/// What a call to [`RecordingSession::observe`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Nothing recorded this frame.
    Idle,
    /// A new file was opened and this frame written as its first frame.
    Started { path: PathBuf },
    /// The frame was appended to the open file.
    Recorded,
    /// The quiet period elapsed; the file was closed without this frame.
    Stopped(FinishedRecording),
}

struct ActiveRecording<W> {
    writer: W,
    path: PathBuf,
    last_unknown_seen: Instant,
    frames: u64,
}

/// The single evidence recording session of a watch loop.
pub struct RecordingSession<S: EvidenceSink> {
    sink: S,
    output_dir: PathBuf,
    buffer: Duration,
    fps: f64,
    active: Option<ActiveRecording<S::Writer>>,
}

impl<S: EvidenceSink> RecordingSession<S> {
    pub fn new(sink: S, output_dir: impl Into<PathBuf>, buffer: Duration, fps: f64) -> Self {
        Self {
            sink,
            output_dir: output_dir.into(),
            buffer,
            fps,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Path of the open evidence file, if recording.
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Advance the state machine by one frame.
    ///
    /// `now` drives the buffer window; `wall` names a newly opened file.
    /// On a writer failure the session is left INACTIVE.
    pub fn observe(
        &mut self,
        unknown_present: bool,
        frame: &Frame,
        now: Instant,
        wall: DateTime<Local>,
    ) -> Result<RecordingEvent, RecordingError> {
        let Some(active) = self.active.as_mut() else {
            if !unknown_present {
                return Ok(RecordingEvent::Idle);
            }
            return self.start(frame, now, wall);
        };

        if unknown_present {
            active.last_unknown_seen = now;
        } else if now.saturating_duration_since(active.last_unknown_seen) > self.buffer {
            return match self.stop()? {
                Some(finished) => Ok(RecordingEvent::Stopped(finished)),
                None => Ok(RecordingEvent::Idle),
            };
        }

        if let Err(source) = active.writer.write(frame) {
            let path = active.path.clone();
            self.abandon();
            return Err(RecordingError::Write { path, source });
        }
        active.frames += 1;
        Ok(RecordingEvent::Recorded)
    }

    /// Close the open recording, if any. Calling this while INACTIVE is a
    /// no-op returning `Ok(None)`.
    pub fn stop(&mut self) -> Result<Option<FinishedRecording>, RecordingError> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };

        let finished = FinishedRecording {
            path: active.path,
            frames: active.frames,
        };
        active.writer.close().map_err(|source| RecordingError::Close {
            path: finished.path.clone(),
            source,
        })?;

        tracing::info!(path = %finished.path.display(), frames = finished.frames, "stopped recording");
        Ok(Some(finished))
    }

    fn start(&mut self, frame: &Frame, now: Instant, wall: DateTime<Local>) -> Result<RecordingEvent, RecordingError> {
        let path = self.output_dir.join(evidence_file_name(wall));

        let mut writer = self
            .sink
            .open(&path, frame.width(), frame.height(), self.fps)
            .map_err(|source| RecordingError::Open { path: path.clone(), source })?;

        if let Err(source) = writer.write(frame) {
            if let Err(e) = writer.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to close evidence file after write error");
            }
            return Err(RecordingError::Write { path, source });
        }

        tracing::info!(path = %path.display(), "started recording");
        self.active = Some(ActiveRecording {
            writer,
            path: path.clone(),
            last_unknown_seen: now,
            frames: 1,
        });
        Ok(RecordingEvent::Started { path })
    }

    /// Drop back to INACTIVE after a write failure, releasing the writer.
    fn abandon(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.writer.close() {
                tracing::warn!(path = %active.path.display(), error = %e, "failed to close evidence file after write error");
            }
        }
    }
}

impl<S: EvidenceSink> Drop for RecordingSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "failed to finalize recording on shutdown");
        }
    }
}

/// `unknown_<YYYYMMDD_HHMMSS>.avi` for the given start time.
pub fn evidence_file_name(wall: DateTime<Local>) -> String {
    format!("unknown_{}.avi", wall.format("%Y%m%d_%H%M%S"))
}
