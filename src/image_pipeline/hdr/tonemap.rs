//! Display transform: global Reinhard compression followed by the sRGB OETF.

use rayon::prelude::*;

use crate::image_pipeline::hdr::types::{PreviewImage, RadianceMap};

/// `x / (1 + x)`, maps [0, inf) onto [0, 1).
#[inline]
pub fn reinhard(x: f32) -> f32 {
    if x.is_nan() || x <= 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return 1.0;
    }
    x / (1.0 + x)
}

/// sRGB opto-electronic transfer function on a linear [0, 1] value.
#[inline]
pub fn srgb_encode(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// 8-bit sRGB preview of a radiance map.
pub fn tonemap(map: &RadianceMap) -> PreviewImage {
    let data = map
        .data
        .par_iter()
        .map(|&v| (srgb_encode(reinhard(v)).clamp(0.0, 1.0) * 255.0) as u8)
        .collect();
    PreviewImage { width: map.width, height: map.height, data }
}
