use tracing::{debug, info, info_span, instrument};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::hdr::{
    align::align_frames,
    dynamic_range::{dynamic_range_stops, input_span_stops},
    exposure::{calibrate_exposures, rescale_to_base, select_base_index},
    merge::merge_radiance,
    normalize::normalize_luminance,
    response::recover_response,
    types::{FusionConfig, FusionOutput, Offset},
};

/// Checks the batch invariants before any work is done. `label` names frame
/// `i` in error messages (a file path when the caller has one).
pub fn validate_batch(frames: &[RgbImageData], label: impl Fn(usize) -> String) -> Result<()> {
    if frames.len() < 2 {
        return Err(FusionError::NotEnoughFrames { count: frames.len() });
    }

    let first = &frames[0];
    if first.width == 0 || first.height == 0 {
        return Err(FusionError::InvalidDimensions(first.width, first.height));
    }

    for (index, frame) in frames.iter().enumerate() {
        if (frame.width, frame.height) != (first.width, first.height) {
            return Err(FusionError::ShapeMismatch {
                frame: label(index),
                expected: (first.width, first.height),
                actual: (frame.width, frame.height),
            });
        }
        if frame.data.len() != frame.expected_len() {
            return Err(FusionError::BufferSizeMismatch {
                index,
                expected: frame.expected_len(),
                actual: frame.data.len(),
            });
        }
    }
    Ok(())
}

/// Fuses a bracketed batch into a normalized radiance map plus diagnostics.
///
/// `exposure_times[i]` is the shutter time of `frames[i]` in seconds, or
/// `None` when unknown.
#[instrument(skip_all, fields(frames = frames.len(), base_frame = %config.base_frame))]
pub fn fuse(frames: &[RgbImageData], exposure_times: &[Option<f32>], config: &FusionConfig) -> Result<FusionOutput> {
    validate_batch(frames, |i| format!("frame {i}"))?;
    if exposure_times.len() != frames.len() {
        return Err(FusionError::ExposureCountMismatch {
            frames: frames.len(),
            exposures: exposure_times.len(),
        });
    }
    let (width, height) = (frames[0].width, frames[0].height);

    let (aligned, offsets) = {
        let _span = info_span!("align").entered();
        if config.align {
            align_frames(frames, config.max_align_levels, config.exclusion_range)
        } else {
            (frames.to_vec(), vec![Offset::ZERO; frames.len()])
        }
    };

    let means: Vec<f64> = aligned.iter().map(RgbImageData::mean).collect();
    let (exposures, exposures_inferred) = {
        let _span = info_span!("calibrate_exposures").entered();
        calibrate_exposures(exposure_times, &means)
    };
    let input_span_stops = input_span_stops(&exposures);

    let base_index = select_base_index(&means, config.base_frame);
    let exposures = rescale_to_base(&exposures, base_index);
    debug!("Base frame {} ({}), exposures {:?}", base_index, config.base_frame, exposures);

    let response = {
        let _span = info_span!("recover_response").entered();
        match &config.response {
            Some(curve) => curve.clone(),
            None => recover_response(&aligned, &exposures, config.response_samples, config.smoothness)?,
        }
    };

    let (radiance, fallback_samples) = {
        let _span = info_span!("merge_radiance").entered();
        merge_radiance(&aligned, &exposures, &response)
    };

    let radiance = {
        let _span = info_span!("normalize_luminance").entered();
        normalize_luminance(&radiance, config.base_frame.target_log_average())
    };

    let dynamic_range_stops = dynamic_range_stops(&radiance);
    info!(
        width,
        height,
        dynamic_range_stops,
        input_span_stops,
        "Fusion complete"
    );

    Ok(FusionOutput {
        radiance,
        width,
        height,
        dynamic_range_stops,
        input_span_stops,
        exposures,
        base_index,
        offsets,
        exposures_inferred,
        fallback_samples,
    })
}
