//! RAW image reader implementation using the rawloader library.
//!
//! This module provides support for reading various RAW image formats (ARW, CR2, NEF, DNG, etc.)
//! using the rawloader library. Besides the sensor samples it keeps everything the debayer
//! stage needs to turn them into linear RGB: levels, white balance, the camera matrix and
//! the CFA layout. The exposure time comes from the EXIF probe since rawloader does not
//! surface it.

use std::io::Cursor;

use tracing::debug;
use rawloader::RawImageData as RawloaderImageData;
use crate::image_pipeline::common::error::{Result, FusionError};
use crate::image_pipeline::raw::exif;
use crate::image_pipeline::raw::types::RawImageData;
use crate::image_pipeline::raw::reader::RawImageReader;

/// RAW image reader that uses the rawloader library for decoding.
pub struct RawLoaderReader;

/// Default bit depth when no white level information is available from the RAW file.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

/// Removes the masked sensor borders, `crops` being `[top, right, bottom, left]`
/// in pixels. Crops that would leave nothing are ignored.
fn crop_samples(
    samples: Vec<u16>,
    width: usize,
    height: usize,
    cpp: usize,
    crops: [usize; 4],
) -> (Vec<u16>, usize, usize) {
    let [top, right, bottom, left] = crops;
    if crops == [0; 4] || left + right >= width || top + bottom >= height || samples.len() < width * height * cpp {
        return (samples, width, height);
    }

    let cropped_width = width - left - right;
    let cropped_height = height - top - bottom;
    let row_len = width * cpp;
    let data = samples
        .chunks_exact(row_len)
        .skip(top)
        .take(cropped_height)
        .flat_map(|row| row[left * cpp..(left + cropped_width) * cpp].iter().copied())
        .collect();
    (data, cropped_width, cropped_height)
}

impl RawImageReader for RawLoaderReader {
    /// Reads and decodes RAW image data from a byte array.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hdr_fusion_rs::image_pipeline::raw::{RawImageReader, RawLoaderReader};
    ///
    /// let reader = RawLoaderReader;
    /// let raw_bytes = std::fs::read("image.arw").unwrap();
    /// let image_data = reader.read_raw(&raw_bytes).unwrap();
    /// ```
    fn read_raw(&self, data: &[u8]) -> Result<RawImageData> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| FusionError::DecodeError(e.to_string()))?;

        let width = decoded.width;
        let height = decoded.height;

        debug!("Decoded {} {}: {}x{} cpp={}", decoded.clean_make, decoded.clean_model, width, height, decoded.cpp);

        // Integer data is cast directly, float data (normalized 0.0-1.0) is scaled to u16 range
        let samples: Vec<u16> = match &decoded.data {
            RawloaderImageData::Integer(values) => values.clone(),
            RawloaderImageData::Float(values) => {
                values.iter().map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16).collect()
            }
        };

        let (samples, width, height) = crop_samples(samples, width, height, decoded.cpp, decoded.crops);
        if (width, height) != (decoded.width, decoded.height) {
            debug!("Cropped sensor borders {:?} -> {}x{}", decoded.crops, width, height);
        }

        let max_white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let bits_per_sample = if max_white_level == 0 {
            DEFAULT_BITS_PER_SAMPLE
        } else {
            // e.g. 4095 -> 12 bits, 16383 -> 14 bits
            U16_BITS - max_white_level.leading_zeros()
        };

        let exposure_time = exif::exposure_time_seconds(data);
        debug!(
            "bits_per_sample={} (max white level {}), exposure={:?}",
            bits_per_sample, max_white_level, exposure_time
        );

        Ok(RawImageData {
            width,
            height,
            cpp: decoded.cpp,
            data: samples,
            bits_per_sample,
            cfa_pattern: decoded.cropped_cfa().name,
            blacklevels: decoded.blacklevels,
            whitelevels: decoded.whitelevels,
            wb_coeffs: decoded.wb_coeffs,
            cam_to_xyz: decoded.cam_to_xyz(),
            exposure_time,
        })
    }
}
