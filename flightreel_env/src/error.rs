//! Error types for the FlightReel environment layer.

use flightreel_core::ReelError;
use thiserror::Error;

/// Errors raised by scratch storage and video encoders.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Scratch directory could not be created or removed
    #[error("Scratch directory error: {0}")]
    Scratch(String),

    /// Encoder process could not be started
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// Encoder stopped accepting frames or exited abnormally
    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    /// Frame does not match the stream's dimensions
    #[error("Frame size {got_width}x{got_height} does not match {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// Invalid output dimensions or frame rate
    #[error("Invalid video spec: {0}")]
    InvalidSpec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates an encoder failure.
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::EncoderFailed(msg.into())
    }
}

impl From<EnvError> for ReelError {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::Io(io) => ReelError::Io(io),
            EnvError::InvalidSpec(msg) => ReelError::Configuration(msg),
            other => ReelError::Encoding(other.to_string()),
        }
    }
}
