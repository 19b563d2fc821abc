//! warden-hw — Media I/O for the watch loop.
//!
//! V4L2 camera capture and directory replay, ffmpeg-encoded evidence
//! files, overlay rendering and display sinks.

pub mod camera;
pub mod capture;
pub mod convert;
pub mod display;
pub mod evidence;
pub mod overlay;

pub use camera::{Camera, CameraCapture, CameraError, DeviceInfo, PixelFormat};
pub use capture::{CaptureSource, ReplayError, ReplaySource};
pub use display::{DisplayError, DisplaySink, HeadlessDisplay, QuitSignal, SnapshotDisplay};
pub use evidence::{EvidenceError, FfmpegEvidenceSink, FfmpegEvidenceWriter};
pub use overlay::{OverlayError, OverlayRenderer};
