//! RAW image data types

/// Represents decoded RAW image data
#[derive(Debug, Clone)]
pub struct RawImageData {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// Components per pixel: 1 for a CFA mosaic, 3 for linear RGB raws
    pub cpp: usize,
    /// Raw sample data, `width * height * cpp` values
    pub data: Vec<u16>,
    /// Actual bits per sample from the sensor (e.g., 12, 14, or 16)
    pub bits_per_sample: u32,
    /// CFA pattern name as reported by the decoder (e.g. "RGGB")
    pub cfa_pattern: String,
    pub blacklevels: [u16; 4],
    pub whitelevels: [u16; 4],
    /// Camera white balance multipliers (R, G, B, G2); may be NaN
    pub wb_coeffs: [f32; 4],
    /// Camera space to XYZ (D65), last column is the fourth CFA color
    pub cam_to_xyz: [[f32; 4]; 3],
    /// Shutter time in seconds, `None` when the container does not expose it
    pub exposure_time: Option<f32>,
}

impl RawImageData {
    pub fn expected_len(&self) -> usize {
        self.width * self.height * self.cpp
    }
}
