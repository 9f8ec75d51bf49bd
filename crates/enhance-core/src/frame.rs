//! Raw frame buffers.

use image::RgbaImage;

/// A single decoded RGBA frame.
///
/// Dimensions always equal the source's natural size, never a preview or
/// display size. Frames are ephemeral: one is pulled per tick, composited,
/// handed to the encoder, and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    image: RgbaImage,
}

impl RawFrame {
    /// Create an opaque black frame of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let mut image = RgbaImage::new(width, height);
        for pixel in image.pixels_mut() {
            pixel.0 = [0, 0, 0, 255];
        }
        Self { image }
    }

    /// Wrap a raw RGBA buffer. Returns None if the buffer length does not
    /// match `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A frame with either dimension zero carries no decodable pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// The raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }
}

impl From<RgbaImage> for RawFrame {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_opaque_black() {
        let frame = RawFrame::new(4, 2);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert!(frame.as_raw().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        assert!(RawFrame::from_rgba(2, 2, vec![0u8; 15]).is_none());
        assert!(RawFrame::from_rgba(2, 2, vec![0u8; 16]).is_some());
    }

    #[test]
    fn test_zero_size_is_empty() {
        assert!(RawFrame::new(0, 720).is_empty());
        assert!(RawFrame::new(1280, 0).is_empty());
        assert!(!RawFrame::new(1, 1).is_empty());
    }
}
