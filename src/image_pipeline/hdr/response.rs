//! Camera response recovery (Debevec & Malik 1997).
//!
//! For a fixed channel, every sampled pixel `i` seen in frame `j` with value
//! `z_ij` satisfies `g(z_ij) = ln E_i + ln t_j`. Together with a penalty on
//! `g''` and the anchor `g(128) = 0` this is an overdetermined linear system
//! in the 256 table entries and the unknown log irradiances, solved here in
//! the weighted least-squares sense.

use nalgebra::{DMatrix, DVector, SVD};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::debayer::RgbImageData;

/// Distinct 8-bit sample values.
pub const LEVELS: usize = 256;

pub const MID_TONE: f32 = 127.5;

/// Table entry pinned to zero; fixes the additive ambiguity of `g`.
const ANCHOR: usize = 128;

/// Below this spread of log exposures the response is unobservable.
const MIN_LOG_EXPOSURE_SPREAD: f32 = 1e-6;

const SVD_EPS: f64 = 1e-10;

/// Hat weighting: zero at 0 and 255, peak at mid-tone.
#[inline]
pub fn weight(z: u8) -> f32 {
    let z = z as f32;
    z.min(255.0 - z)
}

/// Per-channel table from pixel value to log exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    tables: [[f32; LEVELS]; 3],
}

impl ResponseCurve {
    pub fn from_tables(tables: [[f32; LEVELS]; 3]) -> Self {
        Self { tables }
    }

    /// Response of an ideal linear sensor, `g(z) = ln(z / 128)` with 0 treated as 1.
    pub fn linear() -> Self {
        let table: [f32; LEVELS] =
            std::array::from_fn(|z| ((z.max(1) as f32) / ANCHOR as f32).ln());
        Self { tables: [table; 3] }
    }

    pub fn channel(&self, channel: usize) -> &[f32; LEVELS] {
        &self.tables[channel]
    }

    #[inline]
    pub fn log_exposure(&self, channel: usize, z: u8) -> f32 {
        self.tables[channel][z as usize]
    }
}

/// Solves for one channel's response table.
///
/// `observations[i][j]` is the value of sample `i` in frame `j`;
/// `log_exposures[j]` is `ln t_j`.
pub fn solve_response(observations: &[Vec<u8>], log_exposures: &[f32], smoothness: f32) -> Result<[f32; LEVELS]> {
    let samples = observations.len();
    let frames = log_exposures.len();
    let rows = samples * frames + 1 + (LEVELS - 2);
    let cols = LEVELS + samples;

    let mut a = DMatrix::<f64>::zeros(rows, cols);
    let mut b = DVector::<f64>::zeros(rows);

    let mut k = 0;
    for (i, values) in observations.iter().enumerate() {
        for (&z, &log_t) in values.iter().zip(log_exposures) {
            let w = weight(z) as f64;
            a[(k, z as usize)] = w;
            a[(k, LEVELS + i)] = -w;
            b[k] = w * log_t as f64;
            k += 1;
        }
    }
    // rows of frames missing from an observation stay zero
    k = samples * frames;

    a[(k, ANCHOR)] = 1.0;
    k += 1;

    let lambda = smoothness as f64;
    for z in 1..LEVELS - 1 {
        let w = lambda * weight(z as u8) as f64;
        a[(k, z - 1)] = w;
        a[(k, z)] = -2.0 * w;
        a[(k, z + 1)] = w;
        k += 1;
    }

    let svd = SVD::new(a, true, true);
    let x = svd
        .solve(&b, SVD_EPS)
        .map_err(|e| FusionError::ResponseRecovery(e.to_string()))?;

    let table: [f32; LEVELS] = std::array::from_fn(|z| x[z] as f32);
    if table.iter().any(|v| !v.is_finite()) {
        return Err(FusionError::ResponseRecovery("non-finite response table".to_string()));
    }
    Ok(table)
}

/// Regular grid of sample positions, `samples` points spread over the frame.
pub fn sample_positions(width: usize, height: usize, samples: usize) -> Vec<(usize, usize)> {
    if width == 0 || height == 0 || samples == 0 {
        return Vec::new();
    }
    let x_points = ((samples as f64 * width as f64 / height as f64).sqrt() as usize).clamp(1, width);
    let y_points = (samples / x_points).clamp(1, height);
    let step_x = (width / x_points).max(1);
    let step_y = (height / y_points).max(1);

    let mut positions = Vec::with_capacity(x_points * y_points);
    for j in 0..y_points {
        for i in 0..x_points {
            let x = (step_x / 2 + i * step_x).min(width - 1);
            let y = (step_y / 2 + j * step_y).min(height - 1);
            positions.push((x, y));
        }
    }
    positions
}

/// Recovers the response of all three channels from aligned frames.
///
/// Falls back to [`ResponseCurve::linear`] when all exposures are equal,
/// since the system then only constrains `g` up to an arbitrary slope.
pub fn recover_response(
    frames: &[RgbImageData],
    exposures: &[f32],
    samples: usize,
    smoothness: f32,
) -> Result<ResponseCurve> {
    let log_exposures: Vec<f32> = exposures.iter().map(|e| e.ln()).collect();
    let (lo, hi) = log_exposures
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(hi - lo > MIN_LOG_EXPOSURE_SPREAD) {
        warn!("Exposures do not vary, assuming a linear response");
        return Ok(ResponseCurve::linear());
    }

    let Some(first) = frames.first() else {
        return Ok(ResponseCurve::linear());
    };
    let positions = sample_positions(first.width, first.height, samples);
    debug!("Recovering response from {} samples x {} frames", positions.len(), frames.len());

    let tables = (0..3)
        .into_par_iter()
        .map(|channel| {
            let observations: Vec<Vec<u8>> = positions
                .iter()
                .map(|&(x, y)| {
                    let idx = (y * first.width + x) * 3 + channel;
                    frames.iter().map(|f| f.data[idx]).collect()
                })
                .collect();
            solve_response(&observations, &log_exposures, smoothness)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResponseCurve::from_tables([tables[0], tables[1], tables[2]]))
}
