//! Pipeline conversions module
//!
//! This module contains orchestration logic: RAW files in, radiance TIFF and preview PNG out.

mod raw_to_hdr;
mod timing;

#[cfg(test)]
mod tests;

pub use raw_to_hdr::{MergeSummary, RawToHdrPipeline};
pub use timing::{PipelineTimings, StepTiming, Timer};
