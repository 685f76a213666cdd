//! Error taxonomy shared by every FlightReel stage.
//!
//! Each variant corresponds to one class of failure in the pipeline and
//! carries the name of the stream or stage that produced it, so the final
//! message always points at the offending input.

use thiserror::Error;

/// Result alias used across the FlightReel crates.
pub type ReelResult<T> = Result<T, ReelError>;

/// Errors that can stop (or, for render/sequencing, be recorded by) a run.
#[derive(Debug, Error)]
pub enum ReelError {
    /// Missing required path, malformed field list, invalid output size, etc.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unparsable or insufficient data in one stream
    #[error("data quality error in {stream}: {reason}")]
    DataQuality { stream: String, reason: String },

    /// Reference or required stream absent when aligning
    #[error("alignment error: required stream {stream} is not available")]
    Alignment { stream: String },

    /// Nothing survived the essential-field filter
    #[error("completeness error: no rows left after requiring {fields} essential fields")]
    Completeness { fields: usize },

    /// Frame planning produced nothing usable
    #[error("planning error: {0}")]
    Planning(String),

    /// One frame could not be built or rasterized
    #[error("render error on frame {frame}: {reason}")]
    Render { frame: usize, reason: String },

    /// Frame collection left nothing to encode
    #[error("sequencing error: {0}")]
    Sequencing(String),

    /// Codec/container failure
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Underlying filesystem failure
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader failure
    #[error("csv failure: {0}")]
    Csv(#[from] csv::Error),
}

impl ReelError {
    /// Creates a data quality error for a stream.
    pub fn data_quality(stream: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataQuality {
            stream: stream.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a planning error.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    /// Creates an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Short stage label used in logs and the run report.
    pub fn class(&self) -> &'static str {
        match self {
            ReelError::Configuration(_) => "configuration",
            ReelError::DataQuality { .. } => "data_quality",
            ReelError::Alignment { .. } => "alignment",
            ReelError::Completeness { .. } => "completeness",
            ReelError::Planning(_) => "planning",
            ReelError::Render { .. } => "render",
            ReelError::Sequencing(_) => "sequencing",
            ReelError::Encoding(_) => "encoding",
            ReelError::Io(_) => "io",
            ReelError::Csv(_) => "csv",
        }
    }
}
