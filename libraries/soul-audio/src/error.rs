//! Audio-specific errors
use soul_core::ErrorCode;
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Loudness measurement error
    #[error(transparent)]
    Loudness(#[from] soul_loudness::LoudnessError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),
}

impl AudioError {
    /// Engine error code reported for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::FileNotFound(_) | Self::Io(_) => ErrorCode::FileOpen,
            Self::UnsupportedFormat(_) | Self::Symphonia(_) => ErrorCode::FileForm,
            Self::DecodeError(_) => ErrorCode::Codec,
            Self::Loudness(_) => ErrorCode::Format,
        }
    }
}

impl From<AudioError> for soul_core::SoulError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::FileNotFound(path) => soul_core::SoulError::not_found("File", path),
            AudioError::Io(e) => soul_core::SoulError::Io(e),
            AudioError::Loudness(e) => e.into(),
            other => soul_core::SoulError::analysis(other.to_string()),
        }
    }
}
