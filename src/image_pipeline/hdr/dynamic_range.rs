//! Dynamic-range diagnostics in stops.

use crate::image_pipeline::hdr::luminance::valid_luminance;
use crate::image_pipeline::hdr::normalize::EPSILON;
use crate::image_pipeline::hdr::types::RadianceMap;

const LOW_PERCENTILE: f64 = 0.5;
const HIGH_PERCENTILE: f64 = 99.5;

/// Percentile of sorted data with linear interpolation between ranks.
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            (sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac) as f32
        }
    }
}

/// Stops between the 0.5th and 99.5th luminance percentiles, never negative.
pub fn dynamic_range_stops(map: &RadianceMap) -> f32 {
    let mut valid = valid_luminance(map);
    if valid.len() < 2 {
        return 0.0;
    }
    valid.sort_by(f32::total_cmp);

    let low = percentile(&valid, LOW_PERCENTILE);
    let high = percentile(&valid, HIGH_PERCENTILE);
    if high <= 0.0 {
        return 0.0;
    }
    (high / low.max(EPSILON)).log2().max(0.0)
}

/// Stops between the shortest and longest valid exposure, never negative.
pub fn input_span_stops(exposures: &[f32]) -> f32 {
    let valid: Vec<f32> = exposures.iter().copied().filter(|e| e.is_finite() && *e > 0.0).collect();
    if valid.len() < 2 {
        return 0.0;
    }
    let low = valid.iter().copied().fold(f32::INFINITY, f32::min);
    let high = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (high / low.max(EPSILON)).log2().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert!((percentile(&sorted, 12.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn span_of_bracket() {
        assert!((input_span_stops(&[0.25, 1.0, 4.0]) - 4.0).abs() < 1e-6);
        assert_eq!(input_span_stops(&[1.0]), 0.0);
        assert_eq!(input_span_stops(&[1.0, f32::NAN, -2.0]), 0.0);
        assert_eq!(input_span_stops(&[]), 0.0);
    }

    #[test]
    fn output_range_of_two_level_scene() {
        // half the pixels 16x brighter than the other half
        let mut data = Vec::new();
        for i in 0..200 {
            let v = if i < 100 { 0.05 } else { 0.8 };
            data.extend_from_slice(&[v, v, v]);
        }
        let map = RadianceMap::new(20, 10, data);
        assert!((dynamic_range_stops(&map) - 4.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_maps_report_zero() {
        let black = RadianceMap::new(2, 2, vec![0.0; 12]);
        assert_eq!(dynamic_range_stops(&black), 0.0);

        let mut single = vec![0.0; 12];
        single[0..3].copy_from_slice(&[1.0, 1.0, 1.0]);
        assert_eq!(dynamic_range_stops(&RadianceMap::new(2, 2, single)), 0.0);

        let flat = RadianceMap::new(2, 2, vec![0.5; 12]);
        assert_eq!(dynamic_range_stops(&flat), 0.0);
    }
}
