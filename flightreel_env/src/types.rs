//! Common types shared between the render pool, sequencer and encoders.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Position of a frame among all possible frames of a run.
///
/// Frames are keyed and named by this index, never by completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIndex(pub usize);

impl FrameIndex {
    /// Scratch file name, zero-padded so names sort like indices.
    pub fn file_name(&self) -> String {
        format!("frame_{:06}.png", self.0)
    }
}

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Output resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The codec needs positive, even dimensions.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.width == 0 || self.height == 0 {
            return Err(EnvError::InvalidSpec(format!(
                "output size {}x{} must be positive",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(EnvError::InvalidSpec(format!(
                "output size {}x{} must be even in both dimensions",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Bytes in one packed RGB frame.
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What a render worker produced for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderStatus {
    /// Image written to this path
    Rendered(PathBuf),
    /// Build or rasterization failed
    Failed(String),
}

/// Result of one render task, keyed by its frame index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFrame {
    pub index: FrameIndex,
    pub status: RenderStatus,
}

impl RenderedFrame {
    pub fn rendered(index: FrameIndex, path: PathBuf) -> Self {
        Self {
            index,
            status: RenderStatus::Rendered(path),
        }
    }

    pub fn failed(index: FrameIndex, reason: impl Into<String>) -> Self {
        Self {
            index,
            status: RenderStatus::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, RenderStatus::Rendered(_))
    }
}

/// A decoded frame as packed 8-bit RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub size: FrameSize,
    pub data: Vec<u8>,
}

impl RgbFrame {
    /// Wraps pixel data, checking its length.
    pub fn new(size: FrameSize, data: Vec<u8>) -> Result<Self, EnvError> {
        if data.len() != size.rgb_len() {
            return Err(EnvError::InvalidSpec(format!(
                "{} bytes of pixel data for a {} frame",
                data.len(),
                size
            )));
        }
        Ok(Self { size, data })
    }
}

/// Parameters of the output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSpec {
    pub size: FrameSize,
    pub fps: f64,
    pub output: PathBuf,
}

impl VideoSpec {
    pub fn validate(&self) -> Result<(), EnvError> {
        self.size.validate()?;
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(EnvError::InvalidSpec(format!("fps must be positive, got {}", self.fps)));
        }
        Ok(())
    }
}
