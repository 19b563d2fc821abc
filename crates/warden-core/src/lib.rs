//! warden-core — Unknown-face decision engine.
//!
//! Matches detected faces against an enrollment gallery, drives the evidence
//! recording state machine and throttles alerts. Detection and embedding use
//! SCRFD and ArcFace through ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod annotate;
pub mod detector;
pub mod frame;
pub mod gallery;
pub mod matcher;
pub mod recognizer;
pub mod recording;
pub mod throttle;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use annotate::{annotate, Annotation, OverlayColor};
pub use frame::Frame;
pub use gallery::{EnrolledIdentity, Gallery, GalleryError};
pub use matcher::{any_unknown, FaceMatcher};
pub use recording::{
    EvidenceSink, EvidenceWriter, FinishedRecording, RecordingError, RecordingEvent, RecordingSession,
    SinkError,
};
pub use throttle::{AlertOutcome, AlertThrottle, Notifier, NotifyError, ALERT_MESSAGE};
pub use types::{BoundingBox, DetectedFace, Embedding, Label, MatchResult, PixelRect};

/// SCRFD detection model file name.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";
