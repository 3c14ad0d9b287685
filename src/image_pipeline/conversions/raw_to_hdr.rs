use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{info, info_span, instrument};

use crate::image_pipeline::{
    common::error::{FusionError, Result},
    conversions::timing::PipelineTimings,
    debayer::{CpuDebayer, RgbImageData},
    hdr::{self, FusionOutput},
    preview::{PngPreviewWriter, PreviewWriter},
    raw::{RawImageReader, RawLoaderReader},
    tiff::{ConversionConfig, StandardTiffWriter, TiffWriter},
};

/// Result of a file-level merge, printed as JSON by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub output_path: String,
    pub preview_path: Option<String>,
    pub width: usize,
    pub height: usize,
    pub dynamic_range_stops: f32,
    pub input_span_stops: f32,
}

pub struct RawToHdrPipeline<R: RawImageReader, W: TiffWriter, P: PreviewWriter> {
    reader: R,
    writer: W,
    preview_writer: P,
    config: ConversionConfig,
}

impl RawToHdrPipeline<RawLoaderReader, StandardTiffWriter, PngPreviewWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            reader: RawLoaderReader,
            writer: StandardTiffWriter,
            preview_writer: PngPreviewWriter,
            config,
        }
    }
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| FusionError::OutputWriteError(format!("{}: {}", path.display(), e)))
}

impl<R: RawImageReader, W: TiffWriter, P: PreviewWriter> RawToHdrPipeline<R, W, P> {
    pub fn with_custom(reader: R, writer: W, preview_writer: P, config: ConversionConfig) -> Self {
        Self {
            reader,
            writer,
            preview_writer,
            config,
        }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(FusionError::InvalidDimensions(width, height));
        }
        if let Some(max) = self.config.max_dimension
            && (width > max || height > max)
        {
            return Err(FusionError::InvalidDimensions(width, height));
        }

        Ok(())
    }

    /// Decodes one RAW buffer into display-referred RGB plus its shutter time.
    pub fn decode(&self, input_data: &[u8]) -> Result<(RgbImageData, Option<f32>)> {
        let raw_image = {
            let _span = info_span!("decode_raw", input_size = input_data.len()).entered();
            self.reader.read_raw(input_data)?
        };
        self.validate_dimensions(raw_image.width, raw_image.height)?;

        let rgb = {
            let _span = info_span!("debayer", width = raw_image.width, height = raw_image.height).entered();
            CpuDebayer::new(self.config.color_space).process(&raw_image)?
        };
        Ok((rgb, raw_image.exposure_time))
    }

    /// Decodes and fuses labelled RAW buffers. Any per-frame failure is
    /// wrapped in [`FusionError::InFile`] with the frame's label.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn fuse_inputs<S: AsRef<str>, B: AsRef<[u8]>>(&self, inputs: &[(S, B)]) -> Result<FusionOutput> {
        if inputs.len() < 2 {
            return Err(FusionError::NotEnoughFrames { count: inputs.len() });
        }

        let mut frames = Vec::with_capacity(inputs.len());
        let mut exposure_times = Vec::with_capacity(inputs.len());
        for (label, data) in inputs {
            let (rgb, exposure_time) = self
                .decode(data.as_ref())
                .map_err(|e| FusionError::InFile {
                    file: label.as_ref().to_string(),
                    source: Box::new(e),
                })?;
            info!(
                frame = label.as_ref(),
                exposure_time = ?exposure_time,
                mean = rgb.mean(),
                "Decoded frame"
            );
            frames.push(rgb);
            exposure_times.push(exposure_time);
        }

        hdr::validate_batch(&frames, |i| inputs[i].0.as_ref().to_string())?;
        hdr::fuse(&frames, &exposure_times, &self.config.fusion)
    }

    /// Writes the radiance TIFF and, when requested, the tone-mapped preview.
    pub fn write_outputs(&self, output: &FusionOutput, output_path: &Path, preview_path: Option<&Path>) -> Result<()> {
        {
            let _span = info_span!("encode_tiff").entered();
            let mut file = create_output(output_path)?;
            self.writer.write_radiance(&output.radiance, &mut file, &self.config)?;
            file.flush()
                .map_err(|e| FusionError::OutputWriteError(format!("{}: {}", output_path.display(), e)))?;
        }

        if let Some(preview_path) = preview_path {
            let _span = info_span!("encode_preview").entered();
            let preview = hdr::tonemap(&output.radiance);
            let mut file = create_output(preview_path)?;
            self.preview_writer.write_preview(&preview, &mut file)?;
            file.flush()
                .map_err(|e| FusionError::OutputWriteError(format!("{}: {}", preview_path.display(), e)))?;
        }
        Ok(())
    }

    /// Merges RAW files into `output_path` (`.tif`/`.tiff`), optionally
    /// writing a PNG preview.
    pub fn merge_files<I: AsRef<Path>>(
        &self,
        input_paths: &[I],
        output_path: impl AsRef<Path>,
        preview_path: Option<&Path>,
    ) -> Result<MergeSummary> {
        self.merge_files_with_timings(input_paths, output_path, preview_path)
            .map(|(summary, _)| summary)
    }

    #[instrument(skip_all, fields(inputs = input_paths.len()))]
    pub fn merge_files_with_timings<I: AsRef<Path>>(
        &self,
        input_paths: &[I],
        output_path: impl AsRef<Path>,
        preview_path: Option<&Path>,
    ) -> Result<(MergeSummary, PipelineTimings)> {
        let output_path = output_path.as_ref();
        if !has_extension(output_path, &["tif", "tiff"]) {
            return Err(FusionError::UnsupportedFormat(format!(
                "{}: radiance output must be .tif or .tiff",
                output_path.display()
            )));
        }
        if let Some(preview_path) = preview_path
            && !has_extension(preview_path, &["png"])
        {
            return Err(FusionError::UnsupportedFormat(format!(
                "{}: preview output must be .png",
                preview_path.display()
            )));
        }
        if input_paths.len() < 2 {
            return Err(FusionError::NotEnoughFrames { count: input_paths.len() });
        }

        let mut timings = PipelineTimings::new();

        let inputs = timings.measure("read_inputs", || {
            input_paths
                .iter()
                .map(|path| {
                    let path = path.as_ref();
                    std::fs::read(path)
                        .map(|data| (path.display().to_string(), data))
                        .map_err(|e| FusionError::InputReadError(format!("{}: {}", path.display(), e)))
                })
                .collect::<Result<Vec<(String, Vec<u8>)>>>()
        })?;

        let output = timings.measure("decode_and_fuse", || self.fuse_inputs(&inputs))?;
        timings.measure("write_outputs", || self.write_outputs(&output, output_path, preview_path))?;

        info!(
            output = %output_path.display(),
            width = output.width,
            height = output.height,
            "Merge complete"
        );
        timings.log_summary();

        let summary = MergeSummary {
            output_path: output_path.display().to_string(),
            preview_path: preview_path.map(|p| p.display().to_string()),
            width: output.width,
            height: output.height,
            dynamic_range_stops: output.dynamic_range_stops,
            input_span_stops: output.input_span_stops,
        };
        Ok((summary, timings))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConversionConfig) {
        self.config = config;
    }
}
