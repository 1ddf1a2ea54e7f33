use std::io;
use thiserror::Error;

/// error type for a single file conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// error: I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// error: the source file does not belong to any supported category
    #[error("Unsupported file format: {0}")]
    UnsupportedInputFormat(String),

    /// error: the requested target cannot be produced from this source
    #[error("Output format not supported: {0}")]
    UnsupportedOutputFormat(String),

    /// error: error from the `hound` crate for WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// error: error from the `claxon` crate for FLAC
    #[error("FLAC error: {0}")]
    Flac(String),

    /// error: audio could not be decoded by `symphonia`
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    /// error: image decode or encode failure from the `image` crate
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// error: the `webp` encoder rejected the surface
    #[error("WebP error: {0}")]
    WebP(String),

    /// error: the source text is not valid for the requested transform
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// error: the MP3 bitstream encoder rejected its settings or input
    #[error("MP3 encoder error: {0}")]
    Mp3Encoder(String),

    /// error: the transcoding engine failed to run or produced no output
    #[error("Video engine error: {0}")]
    Engine(String),

    /// error: a lazily loaded dependency could not be initialized
    #[error("Failed to load {name}: {reason}")]
    DependencyLoad { name: String, reason: String },

    /// error: with respect to file paths
    #[error("Path error: {0}")]
    Path(String),

    /// error: during argument parsing or validation
    #[error("Argument error: {0}")]
    Argument(String),

    // catch all for other errors
    #[error("An unexpected error occurred: {0}")]
    Other(String),
}

/// reason a file is refused at ingestion; rejected files never become convertible
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("File is too large (max {}MB)", limit_bytes / (1024 * 1024))]
    TooLarge { limit_bytes: u64 },

    #[error("File format is not supported")]
    Unsupported,
}

impl From<tokio::task::JoinError> for ConvertError {
    fn from(e: tokio::task::JoinError) -> Self {
        ConvertError::Other(format!("conversion task failed: {}", e))
    }
}
