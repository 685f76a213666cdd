//! Video encoder abstraction.

use crate::error::EnvError;
use crate::types::{RgbFrame, VideoSpec};

/// Produces sinks that accept frames in presentation order.
///
/// # Implementations
///
/// - **Production**: `FfmpegEncoder` - pipes raw RGB into an ffmpeg process
/// - **In-memory**: `MemoryEncoder` - records frames, used by tests
///
/// # Frame Flow
///
/// ```text
/// Assembler                 Sink                     Container
///   |-- write_frame(f0) ---->|                           |
///   |-- write_frame(f1) ---->|-- encode in order ------->|
///   |-- finish() ----------->|-- flush + close --------->|
/// ```
pub trait VideoEncoder: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Opens a new output described by `spec`.
    ///
    /// # Returns
    /// * `Ok(sink)` - Ready to accept frames of `spec.size`
    /// * `Err(EnvError::EncoderUnavailable)` - Backend could not be started
    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn VideoSink>, EnvError>;
}

/// An open, append-only video stream.
pub trait VideoSink {
    /// Appends one frame. Frames must match the video size.
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), EnvError>;

    /// Flushes and closes the container.
    fn finish(self: Box<Self>) -> Result<(), EnvError>;
}
