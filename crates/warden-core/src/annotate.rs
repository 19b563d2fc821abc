//! Overlay geometry for matched faces. Pure: rendering happens in `warden-hw`.

use crate::types::{Label, MatchResult, PixelRect};

/// Height of the filled label band at the bottom of each face box.
pub const LABEL_BAND_HEIGHT: i32 = 35;
/// Offset of the label text from the band's bottom-left corner.
pub const LABEL_TEXT_INSET: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayColor {
    Unknown,
    Known,
}

impl OverlayColor {
    /// RGB value: red for unknown, green for known.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            OverlayColor::Unknown => [255, 0, 0],
            OverlayColor::Known => [0, 255, 0],
        }
    }
}

/// Everything needed to draw one face's overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub rect: PixelRect,
    pub label_band: PixelRect,
    pub text: String,
    /// Left end of the text baseline.
    pub text_origin: (i32, i32),
    pub color: OverlayColor,
}

pub fn annotate(results: &[MatchResult]) -> Vec<Annotation> {
    results
        .iter()
        .map(|result| {
            let rect = result.face.bbox.pixel_rect();
            let color = match result.label {
                Label::Unknown => OverlayColor::Unknown,
                Label::Known(_) => OverlayColor::Known,
            };
            Annotation {
                rect,
                label_band: PixelRect {
                    top: rect.bottom - LABEL_BAND_HEIGHT,
                    ..rect
                },
                text: result.label.to_string(),
                text_origin: (rect.left + LABEL_TEXT_INSET, rect.bottom - LABEL_TEXT_INSET),
                color,
            }
        })
        .collect()
}
