use std::fmt;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Box with no landmarks and full confidence, in pixel edges.
    pub fn from_edges(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            x: left as f32,
            y: top as f32,
            width: (right - left) as f32,
            height: (bottom - top) as f32,
            confidence: 1.0,
            landmarks: None,
        }
    }

    /// Integer pixel edges of this box.
    pub fn pixel_rect(&self) -> PixelRect {
        let left = self.x.round() as i32;
        let top = self.y.round() as i32;
        PixelRect {
            top,
            right: (self.x + self.width).round() as i32,
            bottom: (self.y + self.height).round() as i32,
            left,
        }
    }
}

/// Rectangle in pixel units, stored as (top, right, bottom, left) edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl PixelRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A face found in the current frame, with its embedding.
///
/// Produced fresh every frame and never persisted.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// Identity decision for one face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Known(String),
    Unknown,
}

impl Label {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Label::Unknown)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Known(name) => f.write_str(name),
            Label::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Result of matching one detected face against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub face: DetectedFace,
    pub label: Label,
    /// Distance to the labelled entry, or to the nearest entry when unknown.
    /// Always >= 0; `f32::INFINITY` against an empty gallery.
    pub distance: f32,
}
