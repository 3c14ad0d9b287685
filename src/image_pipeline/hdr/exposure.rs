//! Exposure calibration and base-frame selection.
//!
//! Shutter times from metadata are used when they actually differ. Cameras
//! that report nothing useful (or the same value for every frame) get a
//! relative exposure inferred from mean frame brightness instead.

use tracing::{debug, warn};

use crate::image_pipeline::hdr::types::BaseFrame;

/// Substituted for missing, non-finite or non-positive exposure times.
pub const DEFAULT_EXPOSURE: f32 = 1.0;

/// Floor applied to mean brightness before dividing by it.
const BRIGHTNESS_FLOOR: f64 = 1e-6;

const EQUAL_RTOL: f32 = 1e-5;
const EQUAL_ATOL: f32 = 1e-8;

/// Replaces unknown or invalid exposure times with [`DEFAULT_EXPOSURE`].
pub fn resolve_exposure_times(times: &[Option<f32>]) -> Vec<f32> {
    times
        .iter()
        .map(|t| match t {
            Some(v) if v.is_finite() && *v > 0.0 => *v,
            _ => DEFAULT_EXPOSURE,
        })
        .collect()
}

/// True when every value matches the first within floating tolerance.
pub fn all_equal(times: &[f32]) -> bool {
    let Some(&first) = times.first() else {
        return true;
    };
    times
        .iter()
        .all(|&t| (t - first).abs() <= EQUAL_ATOL + EQUAL_RTOL * first.abs())
}

/// Relative exposures from mean brightness: darkest frame = 1.0.
pub fn infer_from_brightness(means: &[f64]) -> Vec<f32> {
    let floored: Vec<f64> = means.iter().map(|m| m.max(BRIGHTNESS_FLOOR)).collect();
    let min = floored.iter().copied().fold(f64::INFINITY, f64::min);
    floored.iter().map(|m| (m / min) as f32).collect()
}

/// Produces a positive, finite exposure vector. The flag reports whether
/// brightness inference replaced the supplied times.
pub fn calibrate_exposures(times: &[Option<f32>], means: &[f64]) -> (Vec<f32>, bool) {
    let resolved = resolve_exposure_times(times);
    if !all_equal(&resolved) {
        debug!("Using metadata exposures: {:?}", resolved);
        return (resolved, false);
    }

    let inferred = infer_from_brightness(means);
    warn!("Exposure times are all equal, inferred from brightness: {:?}", inferred);
    (inferred, true)
}

/// Picks the anchor frame by ranking frames on mean brightness.
pub fn select_base_index(means: &[f64], policy: BaseFrame) -> usize {
    if means.is_empty() {
        return 0;
    }
    let mut ranked: Vec<usize> = (0..means.len()).collect();
    ranked.sort_by(|&a, &b| means[a].total_cmp(&means[b]));

    match policy {
        BaseFrame::Darkest => ranked[0],
        BaseFrame::Middle => ranked[means.len() / 2],
        // first frame holding the maximum, not the last after a stable sort
        BaseFrame::Brightest => {
            let max = means[ranked[means.len() - 1]];
            means.iter().position(|&m| m == max).unwrap_or(ranked[means.len() - 1])
        }
    }
}

/// Scales exposures so that the base frame is exactly 1.0.
pub fn rescale_to_base(exposures: &[f32], base_index: usize) -> Vec<f32> {
    let anchor = exposures.get(base_index).copied().unwrap_or(DEFAULT_EXPOSURE);
    exposures
        .iter()
        .enumerate()
        .map(|(i, &e)| if i == base_index { 1.0 } else { e / anchor })
        .collect()
}
