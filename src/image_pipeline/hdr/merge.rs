//! Weighted log-domain merge of aligned frames into linear radiance.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::hdr::response::{weight, ResponseCurve, MID_TONE};
use crate::image_pipeline::hdr::types::RadianceMap;

/// Keeps exp() finite in f32.
const MAX_LOG_RADIANCE: f32 = 80.0;

/// Radiance of a sample that no frame exposes usefully, taken from the frame
/// whose value is nearest mid-tone. On ties, the estimate giving the tighter
/// bound wins (largest for bright samples, smallest for dark ones). A sample
/// black in every frame has zero radiance.
fn fallback_radiance(values: impl Iterator<Item = (u8, f32)>, response: &ResponseCurve, channel: usize) -> f32 {
    let mut best: Option<(f32, u8, f32)> = None;
    for (z, log_t) in values {
        let distance = (z as f32 - MID_TONE).abs();
        let estimate = response.log_exposure(channel, z) - log_t;
        best = match best {
            None => Some((distance, z, estimate)),
            Some((d, _, _)) if distance < d => Some((distance, z, estimate)),
            Some((d, bz, e)) if distance == d => {
                let tighter = if z as f32 > MID_TONE { estimate > e } else { estimate < e };
                Some(if tighter { (distance, z, estimate) } else { (d, bz, e) })
            }
            keep => keep,
        };
    }
    match best {
        Some((_, z, log_radiance)) if z > 0 => log_radiance.clamp(-MAX_LOG_RADIANCE, MAX_LOG_RADIANCE).exp(),
        _ => 0.0,
    }
}

/// Fuses frames with the Debevec estimator
/// `ln E = sum w(z) (g(z) - ln t) / sum w(z)`, per pixel and channel.
///
/// Returns the unnormalized radiance and the number of samples that used
/// the nearest-mid-tone fallback.
pub fn merge_radiance(frames: &[RgbImageData], exposures: &[f32], response: &ResponseCurve) -> (RadianceMap, usize) {
    let Some(first) = frames.first() else {
        return (RadianceMap::new(0, 0, Vec::new()), 0);
    };
    let (width, height) = (first.width, first.height);
    let log_exposures: Vec<f32> = exposures.iter().map(|e| e.ln()).collect();
    let row_len = width * 3;

    let mut data = vec![0.0f32; width * height * 3];
    let fallback_samples: usize = data
        .par_chunks_mut(row_len.max(1))
        .enumerate()
        .map(|(y, row)| {
            let mut fallbacks = 0;
            for (i, out) in row.iter_mut().enumerate() {
                let idx = y * row_len + i;
                let channel = i % 3;

                let mut weighted_sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for (frame, &log_t) in frames.iter().zip(&log_exposures) {
                    let z = frame.data[idx];
                    let w = weight(z);
                    weighted_sum += w * (response.log_exposure(channel, z) - log_t);
                    weight_sum += w;
                }

                *out = if weight_sum > 0.0 {
                    (weighted_sum / weight_sum).clamp(-MAX_LOG_RADIANCE, MAX_LOG_RADIANCE).exp()
                } else {
                    fallbacks += 1;
                    let values = frames.iter().map(|f| f.data[idx]).zip(log_exposures.iter().copied());
                    fallback_radiance(values, response, channel)
                };
            }
            fallbacks
        })
        .sum();

    if fallback_samples > 0 {
        warn!("{} samples saturated or black in every frame, used nearest mid-tone", fallback_samples);
    }
    debug!("Merged {} frames into {}x{} radiance", frames.len(), width, height);
    (RadianceMap::new(width, height, data), fallback_samples)
}
