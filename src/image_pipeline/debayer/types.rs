//! Types for debayering operations

/// Linear 8-bit RGB frame produced by the debayer stage.
///
/// Samples are white-balanced, in the decode color space, with identity gamma:
/// 0..=255 is proportional to scene brightness up to sensor clipping.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImageData {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub data: Vec<u8>,
}

impl RgbImageData {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// Frame of a single repeated color.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let data = std::iter::repeat_n(rgb, width * height).flatten().collect();
        Self { width, height, data }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn expected_len(&self) -> usize {
        self.pixel_count() * 3
    }

    /// Arithmetic mean over every sample of every channel.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}
