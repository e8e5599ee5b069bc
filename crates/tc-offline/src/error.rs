//! Error types for offline processing

use thiserror::Error;

/// Offline processing errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to read audio file: {0}")]
    ReadError(String),

    #[error("Failed to write output file: {0}")]
    WriteError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameter override: {0}")]
    InvalidOverride(String),

    #[error("No overlap between dry and wet signals after alignment")]
    NoOverlap,

    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DSP error: {0}")]
    Dsp(#[from] tc_core::TcError),
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
