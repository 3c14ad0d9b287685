//! Preview writing module

mod png_writer;

pub use png_writer::{PngPreviewWriter, PreviewWriter};
