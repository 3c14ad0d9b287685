//! Debayering module for converting Bayer pattern RAW images to linear RGB

pub mod color_space;
pub mod cpu_debayer;
pub mod types;

pub use color_space::ColorSpace;
pub use cpu_debayer::CpuDebayer;
pub use types::RgbImageData;
