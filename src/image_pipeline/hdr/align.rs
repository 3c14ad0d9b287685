//! Median threshold bitmap (MTB) registration.
//!
//! Each frame is reduced to a grey pyramid. At every level the grey image is
//! thresholded at its own median, which makes the bitmaps comparable across
//! very different exposures. The offset is searched coarse to fine: the
//! running offset is doubled per level and refined within +-1 pixel.

use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::hdr::types::Offset;

/// Short side of the coarsest pyramid level is kept at least this large.
const MIN_LEVEL_SIZE: usize = 8;

/// Single-channel 8-bit image.
#[derive(Debug, Clone)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn from_rgb(frame: &RgbImageData) -> Self {
        let data = frame
            .data
            .chunks_exact(3)
            .map(|px| ((54 * px[0] as u32 + 183 * px[1] as u32 + 19 * px[2] as u32) >> 8) as u8)
            .collect();
        Self { width: frame.width, height: frame.height, data }
    }

    /// Halves both dimensions with a 2x2 box filter.
    pub fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let y0 = (2 * y).min(self.height - 1);
            let y1 = (2 * y + 1).min(self.height - 1);
            for x in 0..width {
                let x0 = (2 * x).min(self.width - 1);
                let x1 = (2 * x + 1).min(self.width - 1);
                let sum = self.data[y0 * self.width + x0] as u32
                    + self.data[y0 * self.width + x1] as u32
                    + self.data[y1 * self.width + x0] as u32
                    + self.data[y1 * self.width + x1] as u32;
                data.push(((sum + 2) / 4) as u8);
            }
        }
        Self { width, height, data }
    }

    pub fn median(&self) -> u8 {
        let mut histogram = [0usize; 256];
        for &v in &self.data {
            histogram[v as usize] += 1;
        }
        let half = self.data.len() / 2;
        let mut seen = 0;
        for (value, &count) in histogram.iter().enumerate() {
            seen += count;
            if seen > half {
                return value as u8;
            }
        }
        255
    }
}

/// Threshold and exclusion bitmaps for one pyramid level.
#[derive(Debug, Clone)]
pub struct MtbLevel {
    pub width: usize,
    pub height: usize,
    /// Pixel is above the median
    pub threshold: Vec<bool>,
    /// Pixel is far enough from the median to be trusted
    pub included: Vec<bool>,
}

impl MtbLevel {
    pub fn from_gray(gray: &GrayImage, exclusion_range: u8) -> Self {
        let median = gray.median();
        let threshold = gray.data.iter().map(|&v| v > median).collect();
        let included = gray
            .data
            .iter()
            .map(|&v| v.abs_diff(median) > exclusion_range)
            .collect();
        Self { width: gray.width, height: gray.height, threshold, included }
    }

    /// Disagreeing trusted bits between `self` and `other` shifted by `offset`.
    pub fn shifted_error(&self, other: &MtbLevel, offset: Offset) -> usize {
        let mut error = 0;
        for y in 0..self.height {
            let sy = y as i64 - offset.dy as i64;
            if sy < 0 || sy >= other.height as i64 {
                continue;
            }
            let sy = sy as usize;
            for x in 0..self.width {
                let sx = x as i64 - offset.dx as i64;
                if sx < 0 || sx >= other.width as i64 {
                    continue;
                }
                let i = y * self.width + x;
                let j = sy * other.width + sx as usize;
                if self.included[i] && other.included[j] && self.threshold[i] != other.threshold[j] {
                    error += 1;
                }
            }
        }
        error
    }
}

/// Number of pyramid levels for a frame size, at least one.
pub fn pyramid_levels(width: usize, height: usize, max_levels: usize) -> usize {
    let mut short_side = width.min(height);
    let mut levels = 1;
    while levels < max_levels && short_side / 2 >= MIN_LEVEL_SIZE {
        short_side /= 2;
        levels += 1;
    }
    levels
}

/// MTB pyramid, finest level first.
pub fn build_mtb_pyramid(frame: &RgbImageData, levels: usize, exclusion_range: u8) -> Vec<MtbLevel> {
    let mut gray = GrayImage::from_rgb(frame);
    let mut pyramid = Vec::with_capacity(levels);
    for level in 0..levels {
        pyramid.push(MtbLevel::from_gray(&gray, exclusion_range));
        if level + 1 < levels {
            gray = gray.downsample();
        }
    }
    pyramid
}

/// Coarse-to-fine offset search of `candidate` against `reference`.
pub fn compute_offset(reference: &[MtbLevel], candidate: &[MtbLevel]) -> Offset {
    let mut offset = Offset::ZERO;
    for (ref_level, cand_level) in reference.iter().zip(candidate).rev() {
        let center = Offset::new(offset.dx * 2, offset.dy * 2);
        let mut best = center;
        let mut best_error = ref_level.shifted_error(cand_level, center);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let test = Offset::new(center.dx + dx, center.dy + dy);
                let error = ref_level.shifted_error(cand_level, test);
                if error < best_error {
                    best = test;
                    best_error = error;
                }
            }
        }
        offset = best;
    }
    offset
}

/// Applies `out(x, y) = in(x - dx, y - dy)`; uncovered pixels are black.
pub fn shift_frame(frame: &RgbImageData, offset: Offset) -> RgbImageData {
    let (width, height) = (frame.width, frame.height);
    let mut data = vec![0u8; frame.expected_len()];
    for y in 0..height {
        let sy = y as i64 - offset.dy as i64;
        if sy < 0 || sy >= height as i64 {
            continue;
        }
        let sy = sy as usize;
        // contiguous span of x whose source lies inside the frame
        let x_start = offset.dx.max(0) as usize;
        let x_end = (width as i64 + offset.dx as i64).clamp(0, width as i64) as usize;
        if x_start >= x_end {
            continue;
        }
        let src_start = (x_start as i64 - offset.dx as i64) as usize;
        let len = x_end - x_start;
        let dst = &mut data[(y * width + x_start) * 3..(y * width + x_end) * 3];
        dst.copy_from_slice(&frame.data[(sy * width + src_start) * 3..(sy * width + src_start + len) * 3]);
    }
    RgbImageData { width, height, data }
}

/// Aligns every frame to frame 0. Returns the shifted copies and their offsets.
pub fn align_frames(
    frames: &[RgbImageData],
    max_levels: usize,
    exclusion_range: u8,
) -> (Vec<RgbImageData>, Vec<Offset>) {
    let Some(reference) = frames.first() else {
        return (Vec::new(), Vec::new());
    };
    if frames.len() == 1 {
        return (frames.to_vec(), vec![Offset::ZERO]);
    }

    let levels = pyramid_levels(reference.width, reference.height, max_levels);
    let pyramids: Vec<Vec<MtbLevel>> = frames
        .par_iter()
        .map(|frame| build_mtb_pyramid(frame, levels, exclusion_range))
        .collect();

    let offsets: Vec<Offset> = std::iter::once(Offset::ZERO)
        .chain(pyramids[1..].par_iter().map(|p| compute_offset(&pyramids[0], p)).collect::<Vec<_>>())
        .collect();
    debug!("MTB offsets over {} levels: {:?}", levels, offsets);

    let aligned = frames
        .par_iter()
        .zip(offsets.par_iter())
        .map(|(frame, &offset)| {
            if offset == Offset::ZERO { frame.clone() } else { shift_frame(frame, offset) }
        })
        .collect();
    (aligned, offsets)
}
