use std::io::Cursor;

use anyhow::anyhow;
use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::debayer::color_space::ColorSpace;
use crate::image_pipeline::debayer::types::RgbImageData;
use crate::image_pipeline::raw::RawImageData;

/// Demosaics and color-converts RAW sensor data into a linear 8-bit RGB frame.
pub struct CpuDebayer {
    color_space: ColorSpace,
}

impl Default for CpuDebayer {
    fn default() -> Self {
        Self::new(ColorSpace::default())
    }
}

fn cfa_from_name(name: &str) -> Result<CFA> {
    match name.to_ascii_uppercase().as_str() {
        "RGGB" | "" => Ok(CFA::RGGB),
        "BGGR" => Ok(CFA::BGGR),
        "GRBG" => Ok(CFA::GRBG),
        "GBRG" => Ok(CFA::GBRG),
        other => Err(FusionError::UnsupportedFormat(format!("CFA pattern {other}"))),
    }
}

/// Runs bilinear demosaicing, returning interleaved 16-bit RGB.
fn demosaic(raw_image: &RawImageData, cfa: CFA) -> anyhow::Result<Vec<u16>> {
    let width = raw_image.width;
    let height = raw_image.height;

    let (bayer_depth, raster_depth, bytes_per_pixel) = if raw_image.bits_per_sample <= 8 {
        (BayerDepth::Depth8, RasterDepth::Depth8, 1)
    } else {
        (BayerDepth::Depth16LE, RasterDepth::Depth16, 2)
    };

    let bayer_bytes: Vec<u8> = if bytes_per_pixel == 1 {
        raw_image.data.iter().map(|&val| val as u8).collect()
    } else {
        raw_image.data.iter().flat_map(|&val| val.to_le_bytes()).collect()
    };

    let mut output_buf = vec![0u8; width * height * 3 * bytes_per_pixel];
    let mut cursor = Cursor::new(&bayer_bytes[..]);

    debug!("Running demosaic with depth={:?}, CFA={:?}, algo=Linear", bayer_depth, cfa);

    let mut output_raster = RasterMut::new(width, height, raster_depth, &mut output_buf);
    bayer::run_demosaic(&mut cursor, bayer_depth, cfa, Demosaic::Linear, &mut output_raster)
        .map_err(|e| anyhow!("Demosaic failed: {:?}", e))?;

    let rgb = if bytes_per_pixel == 1 {
        output_buf.iter().map(|&v| v as u16).collect()
    } else {
        output_buf
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect()
    };
    Ok(rgb)
}

/// Camera white balance normalized to green. Missing or bogus coefficients become 1.0.
fn white_balance(coeffs: &[f32; 4]) -> [f32; 3] {
    let green = coeffs[1];
    if !green.is_finite() || green <= 0.0 {
        return [1.0; 3];
    }
    let norm = |c: f32| {
        let v = c / green;
        if v.is_finite() && v > 0.0 { v } else { 1.0 }
    };
    [norm(coeffs[0]), 1.0, norm(coeffs[2])]
}

/// Camera RGB -> output RGB. Rows are normalized so a white-balanced neutral
/// stays neutral; XYZ output is normalized on Y instead.
fn camera_matrix(cam_to_xyz: &[[f32; 4]; 3], color_space: ColorSpace) -> [[f32; 3]; 3] {
    let Some(xyz_to_rgb) = color_space.xyz_to_rgb() else {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    };

    let mut m = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            m[r][c] = (0..3).map(|k| xyz_to_rgb[r][k] * cam_to_xyz[k][c]).sum();
        }
    }

    if color_space == ColorSpace::Xyz {
        let y_sum: f32 = m[1].iter().sum();
        if y_sum.is_finite() && y_sum.abs() > 1e-6 {
            m.iter_mut().flatten().for_each(|v| *v /= y_sum);
        }
    } else {
        for row in m.iter_mut() {
            let sum: f32 = row.iter().sum();
            if sum.is_finite() && sum.abs() > 1e-6 {
                row.iter_mut().for_each(|v| *v /= sum);
            }
        }
    }

    let degenerate = m.iter().any(|row| row.iter().sum::<f32>().abs() <= 1e-6);
    if degenerate || m.iter().flatten().any(|v| !v.is_finite()) {
        warn!("Camera matrix is not usable, keeping camera primaries");
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }
    m
}

impl CpuDebayer {
    pub fn new(color_space: ColorSpace) -> Self {
        Self { color_space }
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn process(&self, raw_image: &RawImageData) -> Result<RgbImageData> {
        let width = raw_image.width;
        let height = raw_image.height;
        if width == 0 || height == 0 {
            return Err(FusionError::InvalidDimensions(width, height));
        }
        if raw_image.data.len() < raw_image.expected_len() {
            return Err(FusionError::DecodeError(format!(
                "RAW buffer holds {} samples, expected {}",
                raw_image.data.len(),
                raw_image.expected_len()
            )));
        }
        info!("Starting CPU debayering for image {}x{} ({})", width, height, self.color_space);

        let rgb_raw: Vec<u16> = match raw_image.cpp {
            1 => {
                let cfa = cfa_from_name(&raw_image.cfa_pattern)?;
                demosaic(raw_image, cfa).map_err(|e| FusionError::DecodeError(e.to_string()))?
            }
            3 => raw_image.data[..raw_image.expected_len()].to_vec(),
            cpp => {
                return Err(FusionError::UnsupportedFormat(format!("{cpp} components per pixel")));
            }
        };

        let black_level = raw_image.blacklevels[0] as f32;
        let white_level = raw_image.whitelevels[0] as f32;
        let range = (white_level - black_level).max(1.0);
        let wb = white_balance(&raw_image.wb_coeffs);
        let matrix = camera_matrix(&raw_image.cam_to_xyz, self.color_space);

        let data: Vec<u8> = rgb_raw
            .chunks_exact(3)
            .flat_map(|px| {
                // Black level, normalize, white balance
                let lin: [f32; 3] = std::array::from_fn(|c| {
                    ((px[c] as f32 - black_level).max(0.0) / range) * wb[c]
                });
                std::array::from_fn::<u8, 3, _>(|r| {
                    let v = matrix[r][0] * lin[0] + matrix[r][1] * lin[1] + matrix[r][2] * lin[2];
                    (v.clamp(0.0, 1.0) * 255.0).round() as u8
                })
            })
            .collect();

        Ok(RgbImageData { width, height, data })
    }
}
