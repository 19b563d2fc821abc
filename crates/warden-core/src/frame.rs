//! Captured video frame.

use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Capture sequence number as reported by the source.
    pub sequence: u32,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        Self { image, sequence }
    }

    /// Build a frame from packed RGB24 bytes. Returns `None` when the buffer
    /// length does not equal `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Option<Self> {
        let image = RgbImage::from_raw(width, height, data)?;
        Some(Self::new(image, sequence))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_dimensions() {
        let frame = Frame::from_rgb(vec![0u8; 4 * 2 * 3], 4, 2, 7).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        assert!(Frame::from_rgb(vec![0u8; 5], 4, 2, 0).is_none());
    }
}
