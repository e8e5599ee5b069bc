//! Error types for TwoC

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TcError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid parameter value: {0}")]
    InvalidParam(String),

    #[error("Unknown parameter: {0}")]
    UnknownParam(String),
}

/// Result type alias
pub type TcResult<T> = Result<T, TcError>;
