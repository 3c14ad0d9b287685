//! Radiance fusion core
//!
//! Aligned, white-balanced 8-bit frames go in; a normalized linear radiance
//! map, its dynamic-range diagnostics and an 8-bit preview come out. Every
//! stage is a pure function that allocates its output and leaves its inputs
//! untouched:
//!
//! frames -> [`align`] -> [`exposure`] -> [`response`] + [`merge`] -> [`normalize`] -> {[`dynamic_range`], [`tonemap`]}

pub mod align;
pub mod dynamic_range;
pub mod exposure;
mod fuse;
pub mod luminance;
pub mod merge;
pub mod normalize;
pub mod response;
pub mod tonemap;
pub mod types;


pub use fuse::{fuse, validate_batch};
pub use response::ResponseCurve;
pub use tonemap::tonemap;
pub use types::{
    BaseFrame, FusionConfig, FusionConfigBuilder, FusionOutput, Offset, PreviewImage, RadianceMap,
};
