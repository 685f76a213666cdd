//! FlightReel Environment Layer
//!
//! Everything the rendering pipeline needs from the outside world sits
//! behind this crate:
//! - scratch storage for frame images ([`ScratchDir`])
//! - worker sizing ([`default_worker_count`])
//! - video encoding ([`VideoEncoder`], [`VideoSink`])
//!
//! The production encoder drives an external `ffmpeg` process; the
//! in-memory encoder records frames so pipeline tests run without one.
//!
//! # Example
//!
//! ```ignore
//! use flightreel_env::{FfmpegEncoder, FrameSize, VideoEncoder, VideoSpec};
//!
//! let spec = VideoSpec { size: FrameSize::new(720, 1280), fps: 15.0, output: "out.mp4".into() };
//! let mut sink = FfmpegEncoder::from_env().open(&spec)?;
//! for frame in frames {
//!     sink.write_frame(&frame)?;
//! }
//! sink.finish()?;
//! ```

mod encoder;
mod error;
mod ffmpeg_impl;
mod memory_impl;
mod scratch;
mod types;
mod workers;

pub use encoder::{VideoEncoder, VideoSink};
pub use error::EnvError;
pub use ffmpeg_impl::{FfmpegEncoder, FFMPEG_ENV};
pub use memory_impl::{MemoryEncoder, RecordedVideo};
pub use scratch::{ScratchDir, SCRATCH_PREFIX};
pub use types::{FrameIndex, FrameSize, RenderStatus, RenderedFrame, RgbFrame, VideoSpec};
pub use workers::{default_worker_count, resolve_worker_count};
