//! Image processing pipeline module
//!
//! This module fuses bracketed RAW exposures into a linear radiance map,
//! with separate modules for RAW reading, debayering, radiance fusion, TIFF and
//! preview writing, merge orchestration and bracket-set suggestion.

pub mod raw;
pub mod debayer;
pub mod hdr;
pub mod tiff;
pub mod preview;
pub mod conversions;
pub mod grouping;
pub mod common;

pub use common::{
    FusionError,
    Result,
};

pub use raw::{
    RawImageData,
    RawImageReader,
    RawLoaderReader,
};

pub use debayer::{
    ColorSpace,
    CpuDebayer,
    RgbImageData,
};

pub use hdr::{
    BaseFrame,
    FusionConfig,
    FusionConfigBuilder,
    FusionOutput,
    RadianceMap,
    PreviewImage,
    ResponseCurve,
};

pub use tiff::{
    TiffCompression,
    ConversionConfig,
    ConversionConfigBuilder,
    TiffWriter,
    StandardTiffWriter,
};

pub use preview::{
    PreviewWriter,
    PngPreviewWriter,
};

pub use conversions::{
    MergeSummary,
    PipelineTimings,
    RawToHdrPipeline,
};

pub use grouping::{
    GroupingConfig,
    SuggestedSet,
    suggest_sets,
};
