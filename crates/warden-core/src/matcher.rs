//! Per-face identity decision against the gallery.

use crate::gallery::Gallery;
use crate::types::{DetectedFace, Label, MatchResult};

/// Default maximum embedding distance for a match (lower = stricter).
pub const DEFAULT_TOLERANCE: f32 = 0.4;
/// Default minimum face width in pixels.
pub const DEFAULT_MIN_SIZE: u32 = 50;

/// Labels faces using a fixed distance tolerance.
///
/// Every gallery entry is tested on its own (`distance <= tolerance`) and the
/// **first passing entry in gallery order** names the face, even when a later
/// entry is closer.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    pub tolerance: f32,
    /// Faces narrower than this many pixels are ignored entirely.
    pub min_size: u32,
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            min_size: DEFAULT_MIN_SIZE,
        }
    }
}

impl FaceMatcher {
    pub fn new(tolerance: f32, min_size: u32) -> Self {
        Self { tolerance, min_size }
    }

    /// Label each face that is at least `min_size` wide, preserving input order.
    pub fn match_faces(&self, gallery: &Gallery, faces: Vec<DetectedFace>) -> Vec<MatchResult> {
        faces
            .into_iter()
            .filter(|face| face.bbox.pixel_rect().width() >= self.min_size as i32)
            .map(|face| self.match_face(gallery, face))
            .collect()
    }

    fn match_face(&self, gallery: &Gallery, face: DetectedFace) -> MatchResult {
        let mut first_pass: Option<(usize, f32)> = None;
        let mut nearest = f32::INFINITY;

        for (idx, entry) in gallery.entries().iter().enumerate() {
            let distance = face.embedding.euclidean_distance(&entry.embedding);
            nearest = nearest.min(distance);
            if first_pass.is_none() && distance <= self.tolerance {
                first_pass = Some((idx, distance));
            }
        }

        match first_pass {
            Some((idx, distance)) => {
                let name = &gallery.entries()[idx].name;
                tracing::debug!(name = %name, confidence = 1.0 - distance, "matched known face");
                MatchResult {
                    face,
                    label: Label::Known(name.clone()),
                    distance,
                }
            }
            None => {
                tracing::debug!(closest = nearest, "unknown face");
                MatchResult {
                    face,
                    label: Label::Unknown,
                    distance: nearest,
                }
            }
        }
    }
}

/// True when any result is labelled unknown.
pub fn any_unknown(results: &[MatchResult]) -> bool {
    results.iter().any(|r| r.label.is_unknown())
}
