//! Perceptual luminance helpers shared by normalization and diagnostics.

use crate::image_pipeline::hdr::types::RadianceMap;

/// Rec.709 luma weights.
pub const REC709: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Clips negative values to zero, leaving NaN in place.
#[inline]
pub fn clip_negative(v: f32) -> f32 {
    if v.is_nan() { v } else { v.max(0.0) }
}

/// Luminance of one linear RGB pixel. Negative channels count as zero, a NaN
/// channel makes the whole pixel NaN.
#[inline]
pub fn luminance(rgb: &[f32]) -> f32 {
    REC709[0] * clip_negative(rgb[0]) + REC709[1] * clip_negative(rgb[1]) + REC709[2] * clip_negative(rgb[2])
}

/// Finite, strictly positive luminance values of a radiance map.
pub fn valid_luminance(map: &RadianceMap) -> Vec<f32> {
    map.pixels()
        .map(luminance)
        .filter(|l| l.is_finite() && *l > 0.0)
        .collect()
}
