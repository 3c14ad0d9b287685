use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode RAW image: {0}")]
    DecodeError(String),

    #[error("Failed to encode output image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<FusionError>,
    },

    #[error("Need at least two frames to fuse, got {count}")]
    NotEnoughFrames { count: usize },

    #[error("{frame} is {}x{}, expected {}x{} like the first frame", actual.0, actual.1, expected.0, expected.1)]
    ShapeMismatch {
        frame: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Frame {index} holds {actual} samples, expected {expected}")]
    BufferSizeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Got {exposures} exposure times for {frames} frames")]
    ExposureCountMismatch { frames: usize, exposures: usize },

    #[error("Response curve recovery failed: {0}")]
    ResponseRecovery(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FusionError>;
