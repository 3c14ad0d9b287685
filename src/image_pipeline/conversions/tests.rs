use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::conversions::RawToHdrPipeline;
use crate::image_pipeline::debayer::ColorSpace;
use crate::image_pipeline::hdr::{FusionConfig, PreviewImage, RadianceMap};
use crate::image_pipeline::preview::{PngPreviewWriter, PreviewWriter};
use crate::image_pipeline::raw::{RawImageData, RawImageReader};
use crate::image_pipeline::tiff::{ConversionConfig, StandardTiffWriter, TiffCompression, TiffWriter};

const WIDTH: usize = 24;
const HEIGHT: usize = 16;
const TIMES: [f32; 3] = [0.01, 0.04, 0.16];

/// Serves `frames[data[0]]`, so each input buffer is a one-byte frame index.
struct MockReader {
    should_fail: bool,
    frames: Vec<RawImageData>,
}

impl RawImageReader for MockReader {
    fn read_raw(&self, data: &[u8]) -> Result<RawImageData> {
        if self.should_fail {
            return Err(FusionError::DecodeError("Mock decode error".to_string()));
        }
        data.first()
            .and_then(|&i| self.frames.get(i as usize))
            .cloned()
            .ok_or_else(|| FusionError::DecodeError("unknown mock frame".to_string()))
    }
}

struct MockWriter {
    should_fail: bool,
    written_data: Arc<Mutex<Vec<RadianceMap>>>,
}

impl TiffWriter for MockWriter {
    fn write_radiance(&self, image: &RadianceMap, output: &mut dyn Write, _config: &ConversionConfig) -> Result<()> {
        if self.should_fail {
            return Err(FusionError::EncodeError("Mock encode error".to_string()));
        }
        output.write_all(b"mock tiff")?;
        self.written_data.lock().unwrap().push(image.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MockPreviewWriter {
    written_data: Arc<Mutex<Vec<PreviewImage>>>,
}

impl PreviewWriter for MockPreviewWriter {
    fn write_preview(&self, image: &PreviewImage, _output: &mut dyn Write) -> Result<()> {
        self.written_data.lock().unwrap().push(image.clone());
        Ok(())
    }
}

/// Linear-RGB raw of a smooth gradient scene exposed for `time` seconds.
fn linear_raw(width: usize, height: usize, time: f32) -> RawImageData {
    let gain = time / TIMES[1] * 0.4;
    let data = (0..width * height)
        .flat_map(|i| {
            let scene = 0.05 + 0.9 * i as f32 / (width * height) as f32;
            let level = (scene * gain * 4095.0).min(4095.0) as u16;
            [level, level, level]
        })
        .collect();
    RawImageData {
        width,
        height,
        cpp: 3,
        data,
        bits_per_sample: 12,
        cfa_pattern: String::new(),
        blacklevels: [0; 4],
        whitelevels: [4095; 4],
        wb_coeffs: [1.0; 4],
        cam_to_xyz: [[0.0; 4]; 3],
        exposure_time: Some(time),
    }
}

fn bracket_reader() -> MockReader {
    MockReader {
        should_fail: false,
        frames: TIMES.iter().map(|&t| linear_raw(WIDTH, HEIGHT, t)).collect(),
    }
}

fn test_config() -> ConversionConfig {
    ConversionConfig::builder()
        .color_space(ColorSpace::Raw)
        .fusion(FusionConfig::builder().align(false).build())
        .build()
}

fn mock_pipeline(
    reader: MockReader,
    writer_fails: bool,
) -> (
    RawToHdrPipeline<MockReader, MockWriter, MockPreviewWriter>,
    Arc<Mutex<Vec<RadianceMap>>>,
    Arc<Mutex<Vec<PreviewImage>>>,
) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let previews = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: writer_fails,
        written_data: written.clone(),
    };
    let preview_writer = MockPreviewWriter {
        written_data: previews.clone(),
    };
    let pipeline = RawToHdrPipeline::with_custom(reader, writer, preview_writer, test_config());
    (pipeline, written, previews)
}

fn write_inputs(dir: &Path, count: u8) -> Vec<std::path::PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("frame_{i}.raw"));
            std::fs::write(&path, [i]).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_config_builder() {
    let config = ConversionConfig::builder()
        .compression(TiffCompression::DeflateBest)
        .predictor(Some(3))
        .validate_dimensions(false)
        .max_dimension(Some(10000))
        .color_space(ColorSpace::ProPhoto)
        .build();

    assert_eq!(config.compression, TiffCompression::DeflateBest);
    assert_eq!(config.predictor, Some(3));
    assert!(!config.validate_dimensions);
    assert_eq!(config.max_dimension, Some(10000));
    assert_eq!(config.color_space, ColorSpace::ProPhoto);
    assert!(config.fusion.align);
}

#[test]
fn test_fuse_inputs_uses_shutter_times() {
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), false);
    let inputs = [("short", vec![0u8]), ("mid", vec![1u8]), ("long", vec![2u8])];

    let output = pipeline.fuse_inputs(&inputs).unwrap();

    assert_eq!((output.width, output.height), (WIDTH, HEIGHT));
    assert!(!output.exposures_inferred);
    assert!((output.input_span_stops - 4.0).abs() < 1e-3);
    assert!(output.dynamic_range_stops.is_finite());
    assert!(output.radiance.data.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_reader_failure_names_the_frame() {
    let reader = MockReader {
        should_fail: true,
        frames: Vec::new(),
    };
    let (pipeline, _, _) = mock_pipeline(reader, false);

    let err = pipeline
        .fuse_inputs(&[("a.arw", [0u8]), ("b.arw", [1u8])])
        .unwrap_err();
    match err {
        FusionError::InFile { file, source } => {
            assert_eq!(file, "a.arw");
            assert!(matches!(*source, FusionError::DecodeError(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_oversized_frame_names_the_file() {
    let mut reader = bracket_reader();
    reader.frames[2] = linear_raw(WIDTH, 60, TIMES[2]);
    let (mut pipeline, _, _) = mock_pipeline(reader, false);
    let mut config = test_config();
    config.max_dimension = Some(40);
    pipeline.set_config(config);

    let err = pipeline
        .fuse_inputs(&[("a.arw", [0u8]), ("b.arw", [1u8]), ("c_tall.arw", [2u8])])
        .unwrap_err();
    assert!(err.to_string().contains("c_tall.arw"));
    match err {
        FusionError::InFile { file, source } => {
            assert_eq!(file, "c_tall.arw");
            assert!(matches!(*source, FusionError::InvalidDimensions(WIDTH, 60)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unsupported_layout_names_the_file() {
    let mut reader = bracket_reader();
    reader.frames[1].cpp = 2;
    let (pipeline, _, _) = mock_pipeline(reader, false);

    let err = pipeline
        .fuse_inputs(&[("a.arw", [0u8]), ("b.arw", [1u8])])
        .unwrap_err();
    match err {
        FusionError::InFile { file, source } => {
            assert_eq!(file, "b.arw");
            assert!(matches!(*source, FusionError::UnsupportedFormat(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_shape_mismatch_reports_label() {
    let mut reader = bracket_reader();
    reader.frames[1] = linear_raw(WIDTH / 2, HEIGHT, TIMES[1]);
    let (pipeline, _, _) = mock_pipeline(reader, false);

    let err = pipeline
        .fuse_inputs(&[("a.arw", [0u8]), ("b.arw", [1u8]), ("c.arw", [2u8])])
        .unwrap_err();
    match err {
        FusionError::ShapeMismatch { frame, expected, actual } => {
            assert_eq!(frame, "b.arw");
            assert_eq!(expected, (WIDTH, HEIGHT));
            assert_eq!(actual, (WIDTH / 2, HEIGHT));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_single_input_is_rejected() {
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), false);
    let err = pipeline.fuse_inputs(&[("only", [0u8])]).unwrap_err();
    assert!(matches!(err, FusionError::NotEnoughFrames { count: 1 }));
}

#[test]
fn test_dimension_validation() {
    let (mut pipeline, _, _) = mock_pipeline(bracket_reader(), false);
    let mut config = test_config();
    config.max_dimension = Some(10);
    pipeline.set_config(config);

    let err = pipeline.decode(&[0]).unwrap_err();
    assert!(matches!(err, FusionError::InvalidDimensions(WIDTH, HEIGHT)));

    let mut config = test_config();
    config.validate_dimensions = false;
    config.max_dimension = Some(10);
    pipeline.set_config(config);
    let (rgb, time) = pipeline.decode(&[0]).unwrap();
    assert_eq!(rgb.width, WIDTH);
    assert_eq!(time, Some(TIMES[0]));
}

#[test]
fn test_merge_files_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let output_path = dir.path().join("merged.tiff");
    let preview_path = dir.path().join("merged.png");
    let (pipeline, written, previews) = mock_pipeline(bracket_reader(), false);

    let summary = pipeline
        .merge_files(&inputs, &output_path, Some(preview_path.as_path()))
        .unwrap();

    assert_eq!(summary.width, WIDTH);
    assert_eq!(summary.height, HEIGHT);
    assert_eq!(summary.output_path, output_path.display().to_string());
    assert_eq!(summary.preview_path, Some(preview_path.display().to_string()));
    assert_eq!(std::fs::read(&output_path).unwrap(), b"mock tiff");
    assert_eq!(written.lock().unwrap().len(), 1);

    let previews = previews.lock().unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].data.len(), WIDTH * HEIGHT * 3);
}

#[test]
fn test_merge_without_preview() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 2);
    let output_path = dir.path().join("merged.TIF");
    let (pipeline, _, previews) = mock_pipeline(bracket_reader(), false);

    let summary = pipeline.merge_files(&inputs, &output_path, None).unwrap();

    assert_eq!(summary.preview_path, None);
    assert!(previews.lock().unwrap().is_empty());
    assert!((summary.input_span_stops - 2.0).abs() < 1e-3);
}

#[test]
fn test_merge_records_timings() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), false);

    let (_, timings) = pipeline
        .merge_files_with_timings(&inputs, dir.path().join("out.tif"), None)
        .unwrap();

    let names: Vec<&str> = timings.steps().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["read_inputs", "decode_and_fuse", "write_outputs"]);
    assert!(timings.get_step("decode_and_fuse").is_some());
    assert!(timings.total_duration() >= timings.get_step("read_inputs").unwrap());
}

#[test]
fn test_summary_serializes_camel_case() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), false);

    let summary = pipeline
        .merge_files(&inputs, dir.path().join("out.tif"), None)
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["width"], WIDTH);
    assert_eq!(json["height"], HEIGHT);
    assert!(json["previewPath"].is_null());
    assert!(json["outputPath"].as_str().unwrap().ends_with("out.tif"));
    assert!(json["dynamicRangeStops"].is_number());
    assert!(json["inputSpanStops"].is_number());
}

#[test]
fn test_output_extension_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 2);
    let (pipeline, written, _) = mock_pipeline(bracket_reader(), false);

    let err = pipeline
        .merge_files(&inputs, dir.path().join("out.exr"), None)
        .unwrap_err();
    assert!(matches!(err, FusionError::UnsupportedFormat(_)));

    let preview = dir.path().join("preview.jpg");
    let err = pipeline
        .merge_files(&inputs, dir.path().join("out.tif"), Some(preview.as_path()))
        .unwrap_err();
    assert!(matches!(err, FusionError::UnsupportedFormat(_)));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = write_inputs(dir.path(), 1);
    inputs.push(dir.path().join("missing.raw"));
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), false);

    let err = pipeline
        .merge_files(&inputs, dir.path().join("out.tif"), None)
        .unwrap_err();
    match err {
        FusionError::InputReadError(msg) => assert!(msg.contains("missing.raw")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_writer_failure() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let (pipeline, _, _) = mock_pipeline(bracket_reader(), true);

    let err = pipeline
        .merge_files(&inputs, dir.path().join("out.tif"), None)
        .unwrap_err();
    assert!(matches!(err, FusionError::EncodeError(_)));
}

#[test]
fn test_merge_with_real_writers() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let output_path = dir.path().join("merged.tif");
    let preview_path = dir.path().join("merged.png");
    let pipeline = RawToHdrPipeline::with_custom(
        bracket_reader(),
        StandardTiffWriter,
        PngPreviewWriter,
        test_config(),
    );

    pipeline
        .merge_files(&inputs, &output_path, Some(preview_path.as_path()))
        .unwrap();

    let tiff = std::fs::read(&output_path).unwrap();
    assert!(tiff.starts_with(b"II") || tiff.starts_with(b"MM"));
    let png = std::fs::read(&preview_path).unwrap();
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
}
