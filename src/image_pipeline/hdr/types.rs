//! Core data types and configuration for radiance fusion

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::image_pipeline::hdr::response::ResponseCurve;

/// Which frame anchors the exposure scale and the output brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseFrame {
    Darkest,
    #[default]
    Middle,
    Brightest,
}

impl BaseFrame {
    /// Log-average luminance the fused map is normalized to. Lower anchors keep
    /// highlight headroom, higher anchors lift shadows.
    pub fn target_log_average(self) -> f32 {
        match self {
            BaseFrame::Darkest => 0.10,
            BaseFrame::Middle => 0.18,
            BaseFrame::Brightest => 0.30,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseFrame::Darkest => "darkest",
            BaseFrame::Middle => "middle",
            BaseFrame::Brightest => "brightest",
        }
    }
}

impl FromStr for BaseFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "darkest" => Ok(BaseFrame::Darkest),
            "middle" => Ok(BaseFrame::Middle),
            "brightest" => Ok(BaseFrame::Brightest),
            other => Err(format!("unknown base frame '{other}' (expected darkest, middle or brightest)")),
        }
    }
}

impl fmt::Display for BaseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer translation applied to a frame: `out(x, y) = in(x - dx, y - dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// Unbounded linear-light RGB image, channel-interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct RadianceMap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl RadianceMap {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self { width, height, data }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(3)
    }

    /// Mean over all samples; non-finite samples are skipped.
    pub fn mean(&self) -> f64 {
        let (sum, count) = self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Display-referred 8-bit sRGB view of a radiance map.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Everything a fusion run produces.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    /// Normalized radiance
    pub radiance: RadianceMap,
    pub width: usize,
    pub height: usize,
    /// Stops between the 0.5th and 99.5th luminance percentiles of the output
    pub dynamic_range_stops: f32,
    /// Stops between the shortest and longest calibrated exposure
    pub input_span_stops: f32,
    /// Calibrated exposures, base frame = 1.0
    pub exposures: Vec<f32>,
    pub base_index: usize,
    pub offsets: Vec<Offset>,
    /// Whether exposures were inferred from frame brightness
    pub exposures_inferred: bool,
    /// Samples that fell back to the nearest-mid-tone frame
    pub fallback_samples: usize,
}

/// Configuration for the fusion core
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub base_frame: BaseFrame,
    /// Run median-threshold-bitmap alignment before merging
    pub align: bool,
    /// Upper bound on pyramid levels; the search range is about 2^levels pixels
    pub max_align_levels: usize,
    /// Grey levels around the median excluded from the bitmap comparison
    pub exclusion_range: u8,
    /// Pixel positions sampled for response recovery
    pub response_samples: usize,
    /// Weight of the second-derivative penalty on the response curve
    pub smoothness: f32,
    /// Prebuilt response curve; skips recovery when set
    pub response: Option<ResponseCurve>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            base_frame: BaseFrame::Middle,
            align: true,
            max_align_levels: 6,
            exclusion_range: 4,
            response_samples: 70,
            smoothness: 10.0,
            response: None,
        }
    }
}

impl FusionConfig {
    pub fn builder() -> FusionConfigBuilder {
        FusionConfigBuilder::default()
    }
}

/// Builder for FusionConfig
#[derive(Default)]
pub struct FusionConfigBuilder {
    base_frame: Option<BaseFrame>,
    align: Option<bool>,
    max_align_levels: Option<usize>,
    exclusion_range: Option<u8>,
    response_samples: Option<usize>,
    smoothness: Option<f32>,
    response: Option<ResponseCurve>,
}

impl FusionConfigBuilder {
    pub fn base_frame(mut self, base_frame: BaseFrame) -> Self {
        self.base_frame = Some(base_frame);
        self
    }

    pub fn align(mut self, enable: bool) -> Self {
        self.align = Some(enable);
        self
    }

    pub fn max_align_levels(mut self, levels: usize) -> Self {
        self.max_align_levels = Some(levels);
        self
    }

    pub fn exclusion_range(mut self, range: u8) -> Self {
        self.exclusion_range = Some(range);
        self
    }

    pub fn response_samples(mut self, samples: usize) -> Self {
        self.response_samples = Some(samples);
        self
    }

    pub fn smoothness(mut self, lambda: f32) -> Self {
        self.smoothness = Some(lambda);
        self
    }

    pub fn response(mut self, curve: ResponseCurve) -> Self {
        self.response = Some(curve);
        self
    }

    pub fn build(self) -> FusionConfig {
        let default = FusionConfig::default();
        FusionConfig {
            base_frame: self.base_frame.unwrap_or(default.base_frame),
            align: self.align.unwrap_or(default.align),
            max_align_levels: self.max_align_levels.unwrap_or(default.max_align_levels).max(1),
            exclusion_range: self.exclusion_range.unwrap_or(default.exclusion_range),
            response_samples: self.response_samples.unwrap_or(default.response_samples).max(1),
            smoothness: self.smoothness.unwrap_or(default.smoothness),
            response: self.response.or(default.response),
        }
    }
}
