//! End-to-end run: load, align, filter, plan, render, sequence, encode.
//!
//! [`Pipeline`] drives the stages in order and records each one in a
//! [`RunReport`]. The first fatal error moves the report to `Failed` and
//! stops the run; per-frame failures are counted but never fatal on their
//! own.

use crate::assembler;
use crate::figure::DisplayConfig;
use crate::raster::Rasterizer;
use crate::sequencer;
use crate::worker_pool::{summarize, WorkerPool};
use flightreel_core::report::StreamReport;
use flightreel_core::{
    align, essential_fields, filter, load_all, plan, AlignConfig, AlignedTable, LoaderConfig, PipelineStage,
    PlanConfig, ReelError, ReelResult, RunReport, StreamId,
};
use flightreel_env::{resolve_worker_count, ScratchDir, VideoEncoder, VideoSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "flight_analysis_video.mp4";

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input file per stream
    pub sources: BTreeMap<StreamId, PathBuf>,
    pub loader: LoaderConfig,
    pub align: AlignConfig,
    pub plan: PlanConfig,
    pub display: DisplayConfig,
    pub output: PathBuf,
    /// Worker count; `None` uses one less than the core count
    pub workers: Option<usize>,
    /// Keep the scratch directory after the run
    pub keep_frames: bool,
    /// Parent of the scratch directory; system temp dir when unset
    pub scratch_parent: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            loader: LoaderConfig::default(),
            align: AlignConfig::default(),
            plan: PlanConfig::default(),
            display: DisplayConfig::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers: None,
            keep_frames: false,
            scratch_parent: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_source(mut self, stream: StreamId, path: impl Into<PathBuf>) -> Self {
        self.sources.insert(stream, path.into());
        self
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_align(mut self, align: AlignConfig) -> Self {
        self.align = align;
        self
    }

    pub fn with_plan(mut self, plan: PlanConfig) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_keep_frames(mut self, keep: bool) -> Self {
        self.keep_frames = keep;
        self
    }

    pub fn with_scratch_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.scratch_parent = parent;
        self
    }

    /// Checks everything that can be checked before touching the inputs.
    pub fn validate(&self) -> ReelResult<()> {
        for stream in StreamId::required() {
            if !self.sources.contains_key(&stream) {
                return Err(ReelError::configuration(format!(
                    "no input file given for required stream {}",
                    stream
                )));
            }
        }
        self.loader.validate()?;
        self.align.validate()?;
        self.plan.validate()?;
        self.display.validate()?;
        if self.output.as_os_str().is_empty() {
            return Err(ReelError::configuration("output path is empty"));
        }
        if self.workers == Some(0) {
            return Err(ReelError::configuration("worker count must be at least 1"));
        }
        Ok(())
    }

    pub fn video_spec(&self) -> VideoSpec {
        VideoSpec {
            size: self.display.size,
            fps: self.plan.fps,
            output: self.output.clone(),
        }
    }
}

/// Load, align and filter, recording each stage in `report`.
///
/// Shared by the full render run and the aligned-table export.
pub fn prepare_table(config: &PipelineConfig, report: &mut RunReport) -> ReelResult<AlignedTable> {
    let loaded = load_all(&config.sources, &config.loader)?;
    report.streams = loaded.tables().map(StreamReport::loaded).collect();
    for (stream, reason) in &loaded.excluded {
        report.streams.push(StreamReport::excluded(*stream, reason.clone()));
    }
    info!(
        loaded = loaded.required.len() + loaded.optional.len(),
        excluded = loaded.excluded.len(),
        "Streams loaded"
    );
    report.advance(PipelineStage::Loaded)?;

    let aligned = align(&loaded.required, &loaded.optional, &config.align)?;
    report.reference_rows = Some(aligned.len());
    report.collapsed_reference_rows = aligned.collapsed_reference_rows();
    report.advance(PipelineStage::Aligned)?;

    let essential = essential_fields(&aligned);
    let (table, summary) = filter(&aligned, &essential)?;
    report.filter = Some(summary);
    report.advance(PipelineStage::Filtered)?;
    Ok(table)
}

/// One rendering run.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    rasterizer: &'a dyn Rasterizer,
    encoder: &'a dyn VideoEncoder,
    report: RunReport,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, rasterizer: &'a dyn Rasterizer, encoder: &'a dyn VideoEncoder) -> Self {
        let run_id = Uuid::new_v4().to_string();
        Self {
            config,
            rasterizer,
            encoder,
            report: RunReport::new(run_id),
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Runs every stage. On error the report is left in `Failed`.
    pub fn run(&mut self) -> ReelResult<()> {
        info!(run_id = %self.report.run_id, "Starting run");
        let result = self.run_stages();
        match &result {
            Ok(()) => info!(
                run_id = %self.report.run_id,
                frames_lost = self.report.frames_lost(),
                "Run complete"
            ),
            Err(e) => {
                error!(run_id = %self.report.run_id, stage = ?self.report.stage, class = e.class(), "Run failed: {}", e);
                self.report.fail(e);
            }
        }
        result
    }

    fn run_stages(&mut self) -> ReelResult<()> {
        self.config.validate()?;
        let table = prepare_table(&self.config, &mut self.report)?;

        let frame_plan = plan(&table, &self.config.plan)?;
        self.report.plan = Some(frame_plan.summary());
        self.report.advance(PipelineStage::Planned)?;

        let scratch = match &self.config.scratch_parent {
            Some(parent) => ScratchDir::create_in(parent)?,
            None => ScratchDir::create()?,
        };
        let result = self.render_and_encode(frame_plan.tasks, &scratch);

        if self.config.keep_frames {
            scratch.keep();
        } else if let Err(e) = scratch.close() {
            warn!(error = %e, "Could not remove scratch directory");
        }
        result
    }

    fn render_and_encode(&mut self, tasks: Vec<flightreel_core::FrameTask>, scratch: &ScratchDir) -> ReelResult<()> {
        self.report.advance(PipelineStage::Rendering)?;
        let planned: Vec<usize> = tasks.iter().map(|t| t.index).collect();
        let pool = WorkerPool::new(resolve_worker_count(self.config.workers));
        let results = pool.render_all(tasks, &self.config.display, self.rasterizer, scratch.path());
        let render = summarize(&results, pool.workers());
        if !render.failed.is_empty() {
            warn!(failed = render.failed.len(), attempted = render.attempted, "Some frames failed to render");
        }
        self.report.render = Some(render);

        let sequence = sequencer::collect(&planned, results)?;
        self.report.sequence = Some(sequence.summary.clone());
        self.report.advance(PipelineStage::Sequenced)?;

        let encoded = assembler::encode(&sequence.frames, &self.config.video_spec(), self.encoder)?;
        self.report.encode = Some(encoded);
        self.report.advance(PipelineStage::Encoded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{shade, SolidRasterizer};
    use flightreel_env::MemoryEncoder;
    use std::fmt::Write as _;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// ATT and IMU CSVs covering 10 s at 10 Hz.
    fn inputs(dir: &Path) -> PipelineConfig {
        let mut att = String::from("timestamp,Roll,DesRoll,Pitch,DesPitch,Yaw,DesYaw\n");
        let mut imu = String::from("timestamp,GyrX,GyrY,GyrZ\n");
        for i in 0..=100 {
            let ts = i * 100_000;
            writeln!(att, "{},{},{},0.5,0.5,90,90", ts, i, i).unwrap();
            writeln!(imu, "{},0.01,0.02,0.03", ts + 10_000).unwrap();
        }
        let att_path = dir.join("ATT.csv");
        let imu_path = dir.join("IMU.csv");
        std::fs::write(&att_path, att).unwrap();
        std::fs::write(&imu_path, imu).unwrap();
        PipelineConfig::default()
            .with_source(StreamId::Att, att_path)
            .with_source(StreamId::Imu, imu_path)
            .with_plan(PlanConfig::default().with_fps(10.0).with_window_secs(2.0))
            .with_display(DisplayConfig::default().with_size(8, 6))
            .with_output(dir.join("out.mp4"))
            .with_workers(Some(3))
            .with_scratch_parent(Some(dir.to_path_buf()))
    }

    fn scratch_dirs(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(flightreel_env::SCRATCH_PREFIX))
            .count()
    }

    #[test]
    fn test_one_panicking_frame_costs_one_frame() {
        let dir = tempdir().unwrap();
        let raster = SolidRasterizer::new().panicking(42);
        let encoder = MemoryEncoder::new();
        let mut pipeline = Pipeline::new(inputs(dir.path()), &raster, &encoder);

        pipeline.run().unwrap();
        let report = pipeline.into_report();
        assert!(report.succeeded());
        assert_eq!(report.plan.as_ref().unwrap().selected_frames, 100);
        let render = report.render.as_ref().unwrap();
        assert_eq!(render.succeeded, 99);
        assert_eq!(render.failed.len(), 1);
        assert_eq!(render.failed[0].index, 42);
        assert_eq!(report.frames_lost(), 1);

        let video = encoder.recorded();
        assert!(video.finished);
        assert_eq!(video.frames.len(), 99);
        let expected: Vec<u8> = (0..100).filter(|&i| i != 42).map(shade).collect();
        let got: Vec<u8> = video.frames.iter().map(|f| f.data[0]).collect();
        assert_eq!(got, expected);
        assert_eq!(scratch_dirs(&dir), 0);
    }

    #[test]
    fn test_max_frames_window() {
        let dir = tempdir().unwrap();
        let config = inputs(dir.path());
        let plan_config = config.plan.clone().with_start_frame(95).with_max_frames(Some(10));
        let raster = SolidRasterizer::new();
        let encoder = MemoryEncoder::new();
        let mut pipeline = Pipeline::new(config.with_plan(plan_config), &raster, &encoder);

        pipeline.run().unwrap();
        let plan = pipeline.report().plan.clone().unwrap();
        assert_eq!(plan.selected_frames, 5);
        assert_eq!(plan.first_index, Some(95));
        assert_eq!(plan.last_index, Some(99));
        let got: Vec<u8> = encoder.recorded().frames.iter().map(|f| f.data[0]).collect();
        assert_eq!(got, (95..100).map(shade).collect::<Vec<_>>());
    }

    #[test]
    fn test_keep_frames_leaves_scratch_directory() {
        let dir = tempdir().unwrap();
        let config = inputs(dir.path()).with_keep_frames(true);
        let raster = SolidRasterizer::new();
        let encoder = MemoryEncoder::new();
        Pipeline::new(config, &raster, &encoder).run().unwrap();
        assert_eq!(scratch_dirs(&dir), 1);
    }

    #[test]
    fn test_missing_required_stream_fails_before_loading() {
        let dir = tempdir().unwrap();
        let mut config = inputs(dir.path());
        config.sources.remove(&StreamId::Imu);
        let raster = SolidRasterizer::new();
        let encoder = MemoryEncoder::new();
        let mut pipeline = Pipeline::new(config, &raster, &encoder);

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, ReelError::Configuration(_)));
        let report = pipeline.report();
        assert_eq!(report.stage, PipelineStage::Failed);
        assert_eq!(report.failure.as_ref().unwrap().0, "configuration");
        assert!(encoder.recorded().spec.is_none());
    }

    #[test]
    fn test_every_frame_failing_is_a_sequencing_failure() {
        let dir = tempdir().unwrap();
        let config = inputs(dir.path()).with_plan(
            PlanConfig::default()
                .with_fps(10.0)
                .with_window_secs(2.0)
                .with_max_frames(Some(2)),
        );
        let raster = SolidRasterizer::new().failing(0).empty(1);
        let encoder = MemoryEncoder::new();
        let mut pipeline = Pipeline::new(config, &raster, &encoder);

        assert!(matches!(pipeline.run(), Err(ReelError::Sequencing(_))));
        let report = pipeline.report();
        assert_eq!(report.stage, PipelineStage::Failed);
        let seq_failure = report.failure.as_ref().unwrap();
        assert_eq!(seq_failure.0, "sequencing");
        assert!(report.encode.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let dir = tempdir().unwrap();
        let raster = SolidRasterizer::new();
        let encoder = MemoryEncoder::new();
        let mut pipeline = Pipeline::new(inputs(dir.path()), &raster, &encoder);
        pipeline.run().unwrap();

        let path = dir.path().join("report.json");
        pipeline.report().write_json(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["stage"], "encoded");
        assert_eq!(json["collapsed_reference_rows"], 0);
        assert_eq!(json["streams"].as_array().unwrap().len(), StreamId::all().len());
    }
}
