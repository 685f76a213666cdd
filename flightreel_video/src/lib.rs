//! FlightReel Video - frame rendering and video assembly
//!
//! Takes the frame plan produced by `flightreel_core` and turns it into a
//! video file:
//!
//! ```text
//!   FramePlan ──► WorkerPool ──► Sequencer ──► Assembler ──► video
//!                 (N threads)    (index order)   (VideoEncoder)
//!                     │
//!          build_figure + Rasterizer
//! ```
//!
//! Figures are built as plain data ([`FigureSpec`]) and only then drawn by
//! a [`Rasterizer`], so the pool, sequencer and pipeline can be tested with
//! in-process doubles and no fonts or ffmpeg installed.
//!
//! # Usage
//!
//! ```ignore
//! use flightreel_video::{Pipeline, PipelineConfig, PlottersRasterizer};
//! use flightreel_env::FfmpegEncoder;
//! use flightreel_core::StreamId;
//!
//! let config = PipelineConfig::default()
//!     .with_source(StreamId::Att, "logs/ATT.csv")
//!     .with_source(StreamId::Imu, "logs/IMU.csv");
//! let raster = PlottersRasterizer::new();
//! let encoder = FfmpegEncoder::from_env();
//! let mut pipeline = Pipeline::new(config, &raster, &encoder);
//! pipeline.run()?;
//! ```

pub mod assembler;
pub mod exporter;
pub mod figure;
pub mod pipeline;
pub mod raster;
pub mod sequencer;
pub mod worker_pool;

#[cfg(test)]
pub(crate) mod testing;

pub use exporter::{export_csv, write_csv};
pub use figure::{build_figure, DisplayConfig, FigureSpec, PanelSpec, PlotKey, SeriesSpec};
pub use pipeline::{prepare_table, Pipeline, PipelineConfig, DEFAULT_OUTPUT};
pub use raster::{PlottersRasterizer, Rasterizer};
pub use sequencer::Sequence;
pub use worker_pool::{render_frame, WorkerPool};
