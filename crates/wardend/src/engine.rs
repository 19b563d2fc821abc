//! The watch loop: one iteration per captured frame.

use chrono::{DateTime, Local};
use std::time::Instant;
use warden_core::{
    annotate, any_unknown, AlertOutcome, AlertThrottle, Annotation, EvidenceSink, FaceAnalyzer, FaceMatcher, Frame,
    Gallery, MatchResult, Notifier, RecordingEvent, RecordingSession,
};
use warden_hw::{CaptureSource, DisplaySink, OverlayRenderer, QuitSignal};

/// Time as seen by the loop: monotonic for windows, wall clock for file names.
pub trait Clock {
    fn now(&self) -> Instant;
    fn wall(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The quit signal was raised.
    Quit,
    /// The capture source ran out of frames.
    Exhausted,
    /// The capture source returned an error.
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub recordings: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
    pub reason: StopReason,
}

/// What happened to one frame.
pub struct FrameReport {
    pub results: Vec<MatchResult>,
    pub unknown: bool,
    pub recording: Option<RecordingEvent>,
    pub alert: Option<AlertOutcome>,
    pub annotations: Vec<Annotation>,
    /// The frame with overlays drawn, as shown on the display.
    pub annotated: Frame,
}

/// Owns the per-run state: the gallery, the recording session and the alert throttle.
pub struct WatchLoop<A, S: EvidenceSink, N> {
    analyzer: A,
    gallery: Gallery,
    matcher: FaceMatcher,
    recording: RecordingSession<S>,
    throttle: AlertThrottle<N>,
    overlay: OverlayRenderer,
}

impl<A, S, N> WatchLoop<A, S, N>
where
    A: FaceAnalyzer,
    S: EvidenceSink,
    N: Notifier,
{
    pub fn new(
        analyzer: A,
        gallery: Gallery,
        matcher: FaceMatcher,
        recording: RecordingSession<S>,
        throttle: AlertThrottle<N>,
        overlay: OverlayRenderer,
    ) -> Self {
        Self {
            analyzer,
            gallery,
            matcher,
            recording,
            throttle,
            overlay,
        }
    }

    /// Run until the quit signal, the end of the stream or a capture error.
    ///
    /// Consumes the loop and the capture source: an open recording is
    /// finalized and the source released before this returns.
    pub fn run<C, D, Q, K>(mut self, mut capture: C, display: &mut D, quit: &Q, clock: &K) -> RunSummary
    where
        C: CaptureSource,
        D: DisplaySink + ?Sized,
        Q: QuitSignal + ?Sized,
        K: Clock + ?Sized,
    {
        let mut summary = RunSummary {
            frames: 0,
            recordings: 0,
            alerts_sent: 0,
            alerts_failed: 0,
            reason: StopReason::Exhausted,
        };

        tracing::info!(identities = self.gallery.len(), "watch loop started");

        loop {
            let frame = match capture.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("capture source exhausted");
                    summary.reason = StopReason::Exhausted;
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "capture failed; stopping");
                    summary.reason = StopReason::CaptureFailed;
                    break;
                }
            };

            let report = self.step(&frame, clock.now(), clock.wall());
            tracing::trace!(
                sequence = frame.sequence,
                faces = report.results.len(),
                annotations = report.annotations.len(),
                unknown = report.unknown,
                "frame processed"
            );
            summary.frames += 1;
            if matches!(report.recording, Some(RecordingEvent::Started { .. })) {
                summary.recordings += 1;
            }
            match report.alert {
                Some(AlertOutcome::Sent { .. }) => summary.alerts_sent += 1,
                Some(AlertOutcome::Failed) => summary.alerts_failed += 1,
                _ => {}
            }

            if let Err(e) = display.show(&report.annotated) {
                tracing::warn!(error = %e, sequence = frame.sequence, "display failed");
            }

            if quit.quit_requested() {
                tracing::info!("quit requested");
                summary.reason = StopReason::Quit;
                break;
            }
        }

        self.shutdown();
        drop(capture);

        tracing::info!(
            frames = summary.frames,
            recordings = summary.recordings,
            alerts_sent = summary.alerts_sent,
            alerts_failed = summary.alerts_failed,
            reason = ?summary.reason,
            "watch loop finished"
        );
        summary
    }

    /// Process one frame: analyze, match, drive recording and alerting, annotate.
    pub fn step(&mut self, frame: &Frame, now: Instant, wall: DateTime<Local>) -> FrameReport {
        let faces = self.analyzer.analyze(frame).unwrap_or_else(|e| {
            tracing::warn!(error = %e, sequence = frame.sequence, "face analysis failed; treating frame as empty");
            Vec::new()
        });

        let results = self.matcher.match_faces(&self.gallery, faces);
        let unknown = any_unknown(&results);

        let recording = match self.recording.observe(unknown, frame, now, wall) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::error!(error = %e, "evidence recording failed");
                None
            }
        };

        let alert = unknown.then(|| self.throttle.maybe_alert(true, now));

        let annotations = annotate(&results);
        let mut annotated = frame.clone();
        self.overlay.render(&mut annotated.image, &annotations);

        FrameReport {
            results,
            unknown,
            recording,
            alert,
            annotations,
            annotated,
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.recording.stop() {
            tracing::error!(error = %e, "failed to finalize recording on shutdown");
        }
    }
}
