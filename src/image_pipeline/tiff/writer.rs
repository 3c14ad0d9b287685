use std::io::Write;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::hdr::RadianceMap;
use crate::image_pipeline::tiff::types::ConversionConfig;

pub trait TiffWriter {
    fn write_radiance(&self, image: &RadianceMap, output: &mut dyn Write, config: &ConversionConfig) -> Result<()>;
}
