//! Draws face annotations onto frames.

use ab_glyph::{FontVec, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::{Annotation, PixelRect};

const TEXT_SCALE: f32 = 24.0;
const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a usable font: {source}")]
    InvalidFont {
        path: PathBuf,
        #[source]
        source: InvalidFont,
    },
}

/// Renders [`Annotation`]s. Without a font only boxes and label bands are drawn.
pub struct OverlayRenderer {
    font: Option<FontVec>,
}

impl OverlayRenderer {
    pub fn load(font_path: Option<&Path>) -> Result<Self, OverlayError> {
        let font = match font_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|source| OverlayError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let font = FontVec::try_from_vec(bytes).map_err(|source| OverlayError::InvalidFont {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::debug!(font = %path.display(), "loaded overlay font");
                Some(font)
            }
            None => {
                tracing::info!("no overlay font configured, labels will not be drawn");
                None
            }
        };
        Ok(Self { font })
    }

    pub fn without_text() -> Self {
        Self { font: None }
    }

    pub fn render(&self, image: &mut RgbImage, annotations: &[Annotation]) {
        for annotation in annotations {
            let color = Rgb(annotation.color.rgb());

            for inset in 0..BOX_THICKNESS {
                if let Some(rect) = to_rect(&annotation.rect, inset) {
                    draw_hollow_rect_mut(image, rect, color);
                }
            }
            if let Some(band) = to_rect(&annotation.label_band, 0) {
                draw_filled_rect_mut(image, band, color);
            }

            if let Some(font) = &self.font {
                let (x, baseline) = annotation.text_origin;
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    x,
                    baseline - TEXT_SCALE as i32,
                    PxScale::from(TEXT_SCALE),
                    font,
                    &annotation.text,
                );
            }
        }
    }
}

/// `imageproc` rects must be non-empty.
fn to_rect(r: &PixelRect, inset: i32) -> Option<Rect> {
    let width = r.width() - 2 * inset;
    let height = r.height() - 2 * inset;
    (width > 0 && height > 0).then(|| Rect::at(r.left + inset, r.top + inset).of_size(width as u32, height as u32))
}
