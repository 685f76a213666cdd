//! FlightReel CLI
//!
//! Renders time-aligned flight telemetry CSVs into an analysis video.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flightreel_core::inspect::inspect_csv;
use flightreel_core::{AlignConfig, LoaderConfig, PlanConfig, ReelError, RunReport, StreamId, Timestamp};
use flightreel_env::FfmpegEncoder;
use flightreel_video::{
    export_csv, prepare_table, DisplayConfig, Pipeline, PipelineConfig, PlotKey, PlottersRasterizer, DEFAULT_OUTPUT,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Exit code for a failed run.
const EXIT_FAILURE: i32 = 1;
/// Exit code for unusable arguments or configuration.
const EXIT_USAGE: i32 = 2;

/// FlightReel telemetry video renderer
#[derive(Parser, Debug)]
#[command(name = "flightreel", version)]
#[command(about = "Render flight telemetry CSVs into an analysis video", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write a video
    Render(RenderArgs),
    /// Load, align and filter, then write the aligned table as CSV
    Align(AlignArgs),
    /// Summarize the columns of one or more CSV files
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the available plot keys
    Plots,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Directory holding <CODE>.csv files (ATT.csv, IMU.csv, GPS.csv, ...)
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Attitude CSV (reference timeline)
    #[arg(long)]
    att: Option<PathBuf>,

    /// IMU CSV
    #[arg(long)]
    imu: Option<PathBuf>,

    /// Extra stream as CODE=PATH, e.g. GPS=logs/gps.csv (repeatable)
    #[arg(long = "stream", value_name = "CODE=PATH", value_parser = parse_stream_arg)]
    streams: Vec<(StreamId, PathBuf)>,

    /// Alignment tolerance in milliseconds
    #[arg(long, default_value_t = flightreel_core::alignment::DEFAULT_TOLERANCE_MS)]
    tolerance_ms: i64,

    /// Minimum rows a stream needs after cleaning
    #[arg(long, default_value_t = flightreel_core::stream_loader::DEFAULT_MIN_ROWS)]
    min_rows: usize,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Comma-separated plot keys (see `flightreel plots`)
    #[arg(long, value_delimiter = ',')]
    plots: Vec<PlotKey>,

    #[arg(long, default_value_t = flightreel_video::figure::DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = flightreel_video::figure::DEFAULT_HEIGHT)]
    height: u32,

    #[arg(long, default_value_t = flightreel_core::frame_plan::DEFAULT_FPS)]
    fps: f64,

    /// Trailing window shown in each frame, in seconds
    #[arg(long, default_value_t = flightreel_core::frame_plan::DEFAULT_WINDOW_SECS)]
    window: f64,

    /// Clip start (timestamp in any supported format)
    #[arg(long, value_parser = parse_time_arg)]
    start_time: Option<Timestamp>,

    /// Clip end (timestamp in any supported format)
    #[arg(long, value_parser = parse_time_arg)]
    end_time: Option<Timestamp>,

    /// First frame index to render
    #[arg(long, default_value_t = 0)]
    start_frame: usize,

    /// Render at most this many frames
    #[arg(long)]
    max_frames: Option<usize>,

    /// Stall speed overlay on the speed panel (m/s)
    #[arg(long)]
    stall_speed: Option<f64>,

    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Render workers (default: cores - 1)
    #[arg(long)]
    workers: Option<usize>,

    /// Keep the rendered frame images
    #[arg(long, alias = "disable-cleaning")]
    keep_frames: bool,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AlignArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(short, long, default_value = "aligned.csv")]
    output: PathBuf,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_stream_arg(raw: &str) -> Result<(StreamId, PathBuf), String> {
    let (code, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=PATH, got '{}'", raw))?;
    let stream: StreamId = code.parse()?;
    if path.trim().is_empty() {
        return Err(format!("empty path for stream {}", stream));
    }
    Ok((stream, PathBuf::from(path.trim())))
}

fn parse_time_arg(raw: &str) -> Result<Timestamp, String> {
    Timestamp::parse(raw).ok_or_else(|| format!("unrecognized timestamp '{}'", raw))
}

impl InputArgs {
    /// Stream paths: directory scan first, explicit flags override.
    fn sources(&self) -> Result<BTreeMap<StreamId, PathBuf>> {
        let mut sources = BTreeMap::new();
        if let Some(dir) = &self.csv_dir {
            if !dir.is_dir() {
                bail!("--csv-dir {} is not a directory", dir.display());
            }
            for stream in StreamId::all() {
                let path = dir.join(format!("{}.csv", stream.code()));
                if path.is_file() {
                    sources.insert(stream, path);
                }
            }
        }
        if let Some(att) = &self.att {
            sources.insert(StreamId::Att, att.clone());
        }
        if let Some(imu) = &self.imu {
            sources.insert(StreamId::Imu, imu.clone());
        }
        for (stream, path) in &self.streams {
            sources.insert(*stream, path.clone());
        }
        Ok(sources)
    }

    fn loader(&self) -> LoaderConfig {
        LoaderConfig::default().with_min_rows(self.min_rows)
    }

    fn align(&self) -> AlignConfig {
        AlignConfig::default().with_tolerance_ms(self.tolerance_ms)
    }
}

fn log_id(sources: &BTreeMap<StreamId, PathBuf>) -> String {
    sources
        .get(&StreamId::Att)
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flight".to_string())
}

fn exit_code(err: &ReelError) -> i32 {
    match err {
        ReelError::Configuration(_) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn write_report(report: &RunReport, path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    match report.write_json(path) {
        Ok(()) => info!(path = %path.display(), "Run report written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Could not write run report"),
    }
}

fn render(args: RenderArgs) -> Result<i32> {
    let sources = args.input.sources()?;
    let mut display = DisplayConfig::default()
        .with_size(args.width, args.height)
        .with_stall_speed(args.stall_speed)
        .with_log_id(log_id(&sources));
    if !args.plots.is_empty() {
        display = display.with_plots(args.plots.clone());
    }
    let plan = PlanConfig::default()
        .with_fps(args.fps)
        .with_window_secs(args.window)
        .with_time_range(args.start_time, args.end_time)
        .with_start_frame(args.start_frame)
        .with_max_frames(args.max_frames);

    let mut config = PipelineConfig::default()
        .with_loader(args.input.loader())
        .with_align(args.input.align())
        .with_plan(plan)
        .with_display(display)
        .with_output(args.output.clone())
        .with_workers(args.workers)
        .with_keep_frames(args.keep_frames);
    config.sources = sources;

    let raster = PlottersRasterizer::new();
    let encoder = FfmpegEncoder::from_env();
    let mut pipeline = Pipeline::new(config, &raster, &encoder);
    let result = pipeline.run();
    write_report(pipeline.report(), args.report.as_deref());

    match result {
        Ok(()) => {
            let report = pipeline.report();
            let written = report.encode.as_ref().map_or(0, |e| e.frames_written);
            info!(
                "Video written to {} ({} frames, {} lost)",
                args.output.display(),
                written,
                report.frames_lost()
            );
            Ok(0)
        }
        Err(e) => {
            error!("{}", e);
            Ok(exit_code(&e))
        }
    }
}

fn align(args: AlignArgs) -> Result<i32> {
    let mut config = PipelineConfig::default()
        .with_loader(args.input.loader())
        .with_align(args.input.align());
    config.sources = args.input.sources()?;
    let mut report = RunReport::new(Uuid::new_v4().to_string());

    let result = config
        .validate()
        .and_then(|()| prepare_table(&config, &mut report))
        .and_then(|table| export_csv(&table, &args.output));
    if let Err(e) = &result {
        report.fail(e);
    }
    write_report(&report, args.report.as_deref());

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            error!("{}", e);
            Ok(exit_code(&e))
        }
    }
}

fn inspect(files: &[PathBuf]) -> Result<i32> {
    for path in files {
        let summary = inspect_csv(path).with_context(|| format!("inspecting {}", path.display()))?;
        println!("{}", summary);
    }
    Ok(0)
}

fn plots() -> Result<i32> {
    for key in PlotKey::ALL {
        println!("{:<14} {}", key.key(), key.title());
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let outcome = match cli.command {
        Command::Render(args) => render(args),
        Command::Align(args) => align(args),
        Command::Inspect { files } => inspect(&files),
        Command::Plots => plots(),
    };
    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_arg() {
        let (stream, path) = parse_stream_arg("gps=logs/GPS.csv").unwrap();
        assert_eq!(stream, StreamId::Gps);
        assert_eq!(path, PathBuf::from("logs/GPS.csv"));
        assert!(parse_stream_arg("GPS").is_err());
        assert!(parse_stream_arg("NOPE=x.csv").is_err());
    }

    #[test]
    fn test_cli_parses_render_flags() {
        let cli = Cli::try_parse_from([
            "flightreel",
            "render",
            "--att",
            "ATT.csv",
            "--imu",
            "IMU.csv",
            "--plots",
            "roll_att,speed",
            "--disable-cleaning",
            "--max-frames",
            "10",
        ])
        .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.plots, vec![PlotKey::RollAtt, PlotKey::Speed]);
        assert!(args.keep_frames);
        assert_eq!(args.max_frames, Some(10));
        assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
        let sources = args.input.sources().unwrap();
        assert_eq!(log_id(&sources), "ATT");
    }
}
