//! Log-average luminance normalization.

use tracing::{debug, warn};

use crate::image_pipeline::hdr::luminance::{clip_negative, valid_luminance};
use crate::image_pipeline::hdr::types::RadianceMap;

/// Guards logarithms and divisions against exact zero.
pub const EPSILON: f32 = 1e-6;

const MIN_TARGET: f32 = 1e-3;
const MAX_TARGET: f32 = 1.0;

/// Geometric mean of valid luminance, `None` if the map has no valid pixel.
pub fn log_average_luminance(map: &RadianceMap) -> Option<f32> {
    let valid = valid_luminance(map);
    if valid.is_empty() {
        return None;
    }
    let mean_log = valid.iter().map(|&l| (l as f64 + EPSILON as f64).ln()).sum::<f64>() / valid.len() as f64;
    Some(mean_log.exp() as f32)
}

/// Rescales `map` so its log-average luminance equals `target`.
///
/// Negative samples are clipped to zero; NaN samples are kept and take no
/// part in the log-average. A map without any valid luminance comes back
/// clipped but unscaled.
pub fn normalize_luminance(map: &RadianceMap, target: f32) -> RadianceMap {
    let clipped: Vec<f32> = map.data.iter().copied().map(clip_negative).collect();
    let clipped = RadianceMap::new(map.width, map.height, clipped);

    let Some(log_average) = log_average_luminance(&clipped) else {
        warn!("No valid luminance, leaving radiance unscaled");
        return clipped;
    };

    let target = target.clamp(MIN_TARGET, MAX_TARGET);
    let scale = target / log_average.max(EPSILON);
    debug!("Log-average luminance {:.6}, target {:.3}, scale {:.6}", log_average, target, scale);

    RadianceMap::new(map.width, map.height, clipped.data.iter().map(|v| v * scale).collect())
}
