//! Error types for loudness analysis

use thiserror::Error;

/// Result type for loudness operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur during loudness analysis
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// Invalid sample rate
    #[error("Invalid sample rate: {0} Hz (must be between 8000 and 384000)")]
    InvalidSampleRate(u32),

    /// Invalid channel count
    #[error("Invalid channel count: {0} (must be 1-8)")]
    InvalidChannelCount(u32),

    /// EBU R128 analysis error
    #[error("EBU R128 analysis failed: {0}")]
    AnalysisError(String),

    /// The measurement was not requested when the analyzer was created
    #[error("{0} was not requested for this analysis")]
    ModeNotEnabled(&'static str),

    /// No samples were provided for analysis
    #[error("No audio samples provided for analysis")]
    NoSamples,
}

impl From<ebur128::Error> for LoudnessError {
    fn from(err: ebur128::Error) -> Self {
        Self::AnalysisError(format!("{:?}", err))
    }
}

impl From<LoudnessError> for soul_core::SoulError {
    fn from(err: LoudnessError) -> Self {
        match err {
            LoudnessError::InvalidSampleRate(_) | LoudnessError::InvalidChannelCount(_) => {
                soul_core::SoulError::InvalidInput(err.to_string())
            }
            other => soul_core::SoulError::analysis(other.to_string()),
        }
    }
}
