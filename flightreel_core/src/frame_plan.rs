//! Frame Sampler: frame instants over the clipped time range, each with its
//! causal look-back window.
//!
//! Tasks borrow nothing: each one holds an `Arc` of the clipped table and an
//! index range into it, so windows are read-only views and no rows are
//! copied per frame.

use crate::error::{ReelError, ReelResult};
use crate::table::{AlignedRecord, AlignedTable};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};

/// Default output frame rate.
pub const DEFAULT_FPS: f64 = 15.0;

/// Default look-back window in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 15.0;

/// Sampler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    pub fps: f64,
    pub window_secs: f64,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Index of the first frame to keep (before `max_frames`)
    pub start_frame: usize,
    pub max_frames: Option<usize>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            window_secs: DEFAULT_WINDOW_SECS,
            start_time: None,
            end_time: None,
            start_frame: 0,
            max_frames: None,
        }
    }
}

impl PlanConfig {
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_window_secs(mut self, secs: f64) -> Self {
        self.window_secs = secs;
        self
    }

    pub fn with_time_range(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_start_frame(mut self, start_frame: usize) -> Self {
        self.start_frame = start_frame;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ReelError::configuration(format!("fps must be positive, got {}", self.fps)));
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(ReelError::configuration(format!(
                "window duration must be positive, got {}",
                self.window_secs
            )));
        }
        Ok(())
    }
}

/// One frame to render.
#[derive(Debug, Clone)]
pub struct FrameTask {
    /// Index among all possible frames of the clipped range
    pub index: usize,
    pub instant: Timestamp,
    pub window_secs: f64,
    /// Row range of the causal window in `table`
    pub window: Range<usize>,
    /// True when the window was empty and fell back to the first row
    pub fallback: bool,
    pub table: Arc<AlignedTable>,
}

impl FrameTask {
    /// Rows visible to this frame.
    pub fn records(&self) -> &[AlignedRecord] {
        self.table.slice(self.window.clone())
    }

    /// Left edge of the x-axis.
    pub fn window_start(&self) -> Timestamp {
        self.instant.offset_secs(-self.window_secs)
    }
}

/// Output of [`plan`].
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub tasks: Vec<FrameTask>,
    pub table: Arc<AlignedTable>,
    pub clip_start: Timestamp,
    pub clip_end: Timestamp,
    pub duration_secs: f64,
    /// Frames the clipped range allows before slicing
    pub possible_frames: usize,
}

/// Summary of a plan for the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub clip_start: Timestamp,
    pub clip_end: Timestamp,
    pub duration_secs: f64,
    pub possible_frames: usize,
    pub selected_frames: usize,
    pub first_index: Option<usize>,
    pub last_index: Option<usize>,
    pub fallback_windows: usize,
}

impl FramePlan {
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            clip_start: self.clip_start,
            clip_end: self.clip_end,
            duration_secs: self.duration_secs,
            possible_frames: self.possible_frames,
            selected_frames: self.tasks.len(),
            first_index: self.tasks.first().map(|t| t.index),
            last_index: self.tasks.last().map(|t| t.index),
            fallback_windows: self.tasks.iter().filter(|t| t.fallback).count(),
        }
    }
}

/// `count` evenly spaced instants from `start` to `end` inclusive.
pub fn linspace(start: Timestamp, end: Timestamp, count: usize) -> Vec<Timestamp> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let span = (end.0 - start.0) as f64;
            let step = span / (count - 1) as f64;
            (0..count)
                .map(|i| Timestamp(start.0 + (step * i as f64).round() as i64))
                .collect()
        }
    }
}

/// Plans the frames for a filtered table.
pub fn plan(table: &AlignedTable, config: &PlanConfig) -> ReelResult<FramePlan> {
    config.validate()?;
    let (log_start, log_end) = table
        .time_range()
        .ok_or_else(|| ReelError::planning("aligned table is empty"))?;

    let start = config.start_time.map_or(log_start, |s| s.max(log_start));
    let end = config.end_time.map_or(log_end, |e| e.min(log_end));
    if start >= end {
        return Err(ReelError::planning(format!(
            "start {} is not before end {}",
            start, end
        )));
    }

    let clipped = table.clip(start, end);
    let (clip_start, clip_end) = clipped.time_range().ok_or_else(|| {
        ReelError::planning(format!("no data between {} and {}", start, end))
    })?;
    if clipped.len() < table.len() {
        info!(from = %clip_start, to = %clip_end, rows = clipped.len(), "Clipped time range");
    }

    let duration_secs = clip_end.seconds_since(clip_start);
    let possible_frames = (duration_secs * config.fps).floor() as usize;
    if possible_frames == 0 {
        return Err(ReelError::planning(format!(
            "{:.3}s of data at {} fps yields no frames",
            duration_secs, config.fps
        )));
    }

    if config.start_frame >= possible_frames {
        return Err(ReelError::planning(format!(
            "start frame {} is beyond the {} possible frames",
            config.start_frame, possible_frames
        )));
    }
    let last = config
        .max_frames
        .map_or(possible_frames, |m| config.start_frame.saturating_add(m).min(possible_frames));
    if last <= config.start_frame {
        return Err(ReelError::planning("max frames selects no frames"));
    }

    let instants = linspace(clip_start, clip_end, possible_frames);
    let table = Arc::new(clipped);
    let tasks: Vec<FrameTask> = (config.start_frame..last)
        .map(|index| {
            let instant = instants[index];
            let mut window = table.window_range(instant, config.window_secs);
            let fallback = window.is_empty();
            if fallback {
                window = 0..1;
            }
            FrameTask {
                index,
                instant,
                window_secs: config.window_secs,
                window,
                fallback,
                table: Arc::clone(&table),
            }
        })
        .collect();

    let fallbacks = tasks.iter().filter(|t| t.fallback).count();
    if fallbacks > 0 {
        debug!(fallbacks, "Frames with an empty window use the earliest record");
    }
    info!(
        duration_secs,
        possible = possible_frames,
        selected = tasks.len(),
        first = config.start_frame,
        "Planned frames"
    );

    Ok(FramePlan {
        tasks,
        table,
        clip_start,
        clip_end,
        duration_secs,
        possible_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StreamId;
    use crate::table::FieldValue;
    use crate::timestamp::MICROS_PER_SEC;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// Rows every 100 ms over `secs` seconds, inclusive.
    fn table(secs: i64) -> AlignedTable {
        let records = (0..=secs * 10)
            .map(|i| AlignedRecord {
                timestamp: Timestamp(i * MICROS_PER_SEC / 10),
                values: vec![Some(FieldValue::Number(i as f64))],
            })
            .collect();
        AlignedTable::from_parts(StreamId::Att, vec!["Roll".into()], vec![StreamId::Att], records)
    }

    #[test]
    fn test_frame_count_and_slicing() {
        let t = table(10);
        let cfg = PlanConfig::default().with_fps(10.0).with_window_secs(15.0);
        let full = plan(&t, &cfg).unwrap();
        assert_eq!(full.possible_frames, 100);
        assert_eq!(full.tasks.len(), 100);

        let sliced = plan(&t, &cfg.clone().with_start_frame(95).with_max_frames(Some(10))).unwrap();
        let indices: Vec<usize> = sliced.tasks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![95, 96, 97, 98, 99]);
        assert_eq!(sliced.tasks[0].instant, full.tasks[95].instant);
    }

    #[test]
    fn test_unbounded_max_frames_takes_the_rest() {
        let t = table(10);
        let cfg = PlanConfig::default()
            .with_fps(10.0)
            .with_start_frame(95)
            .with_max_frames(Some(usize::MAX));
        let p = plan(&t, &cfg).unwrap();
        let indices: Vec<usize> = p.tasks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![95, 96, 97, 98, 99]);
    }

    #[test]
    fn test_first_frame_window_is_causal() {
        let t = table(10);
        let p = plan(&t, &PlanConfig::default().with_fps(10.0).with_window_secs(1.0)).unwrap();
        let first = &p.tasks[0];
        assert_eq!(first.instant, Timestamp(0));
        assert_eq!(first.records().len(), 1);
        assert!(!first.fallback);

        let last = p.tasks.last().unwrap();
        // (9s, 10s] holds ten 100 ms rows.
        assert_eq!(last.records().len(), 10);
        assert!(last.records().iter().all(|r| r.timestamp <= last.instant));
    }

    #[test]
    fn test_empty_window_falls_back() {
        let records = [0, 5, 10]
            .iter()
            .map(|&s| AlignedRecord {
                timestamp: Timestamp(s * MICROS_PER_SEC),
                values: vec![Some(FieldValue::Number(s as f64))],
            })
            .collect();
        let t = AlignedTable::from_parts(StreamId::Att, vec!["Roll".into()], vec![StreamId::Att], records);
        let p = plan(&t, &PlanConfig::default().with_fps(1.0).with_window_secs(0.5)).unwrap();
        let gap = p.tasks.iter().find(|t| t.index == 3).unwrap();
        assert!(gap.fallback);
        assert_eq!(gap.records()[0].timestamp, Timestamp(0));
    }

    #[test]
    fn test_clipping() {
        let t = table(20);
        let cfg = PlanConfig::default()
            .with_fps(1.0)
            .with_time_range(Some(Timestamp(5 * MICROS_PER_SEC)), Some(Timestamp(15 * MICROS_PER_SEC)));
        let p = plan(&t, &cfg).unwrap();
        assert_eq!(p.clip_start, Timestamp(5 * MICROS_PER_SEC));
        assert_eq!(p.clip_end, Timestamp(15 * MICROS_PER_SEC));
        assert_eq!(p.possible_frames, 10);
        assert_eq!(p.table.len(), 101);
    }

    #[test]
    fn test_planning_errors() {
        let t = table(10);
        let inverted = PlanConfig::default()
            .with_time_range(Some(Timestamp(8 * MICROS_PER_SEC)), Some(Timestamp(2 * MICROS_PER_SEC)));
        assert_eq!(plan(&t, &inverted).unwrap_err().class(), "planning");

        let beyond = PlanConfig::default().with_fps(1.0).with_start_frame(10);
        assert!(plan(&t, &beyond).unwrap_err().to_string().contains("start frame 10"));

        let too_short = PlanConfig::default().with_fps(0.05);
        assert!(plan(&t, &too_short).is_err());

        let no_data = PlanConfig::default().with_time_range(
            Some(Timestamp(MICROS_PER_SEC / 20)),
            Some(Timestamp(MICROS_PER_SEC / 20 + 10)),
        );
        assert!(plan(&t, &no_data).is_err());
    }

    proptest! {
        #[test]
        fn prop_even_spacing(secs in 2i64..60, fps in 1u32..30) {
            let t = table(secs);
            let p = plan(&t, &PlanConfig::default().with_fps(fps as f64)).unwrap();
            let k = p.tasks.len();
            prop_assert_eq!(k, p.possible_frames);
            if k > 1 {
                let step = p.duration_secs / (k - 1) as f64;
                for w in p.tasks.windows(2) {
                    prop_assert!(w[1].instant > w[0].instant);
                    let gap = w[1].instant.seconds_since(w[0].instant);
                    prop_assert!((gap - step).abs() <= 2e-6);
                }
            }
            assert_relative_eq!(p.duration_secs, secs as f64);
        }

        #[test]
        fn prop_slice_keeps_original_indices(start in 0usize..120, count in 1usize..50) {
            let t = table(10);
            let cfg = PlanConfig::default().with_fps(10.0).with_start_frame(start).with_max_frames(Some(count));
            match plan(&t, &cfg) {
                Ok(p) => {
                    let expected: Vec<usize> = (start..(start + count).min(100)).collect();
                    let got: Vec<usize> = p.tasks.iter().map(|t| t.index).collect();
                    prop_assert_eq!(got, expected);
                }
                Err(_) => prop_assert!(start >= 100),
            }
        }
    }
}
