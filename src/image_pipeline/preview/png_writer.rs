use std::io::Write;

use tracing::debug;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::hdr::PreviewImage;

pub trait PreviewWriter {
    fn write_preview(&self, image: &PreviewImage, output: &mut dyn Write) -> Result<()>;
}

/// Writes the tone-mapped preview as an 8-bit RGB PNG.
pub struct PngPreviewWriter;

impl PreviewWriter for PngPreviewWriter {
    fn write_preview(&self, image: &PreviewImage, output: &mut dyn Write) -> Result<()> {
        debug!("Encoding PNG preview: {}x{}", image.width, image.height);

        let mut encoder = png::Encoder::new(output, image.width as u32, image.height as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| FusionError::EncodeError(e.to_string()))?;
        writer
            .write_image_data(&image.data)
            .map_err(|e| FusionError::EncodeError(e.to_string()))?;
        writer.finish().map_err(|e| FusionError::EncodeError(e.to_string()))?;
        Ok(())
    }
}
