//! Rasterizer doubles and synthetic plans for pipeline tests.

use crate::figure::FigureSpec;
use crate::raster::Rasterizer;
use flightreel_core::timestamp::MICROS_PER_SEC;
use flightreel_core::{plan, AlignedRecord, AlignedTable, FieldValue, FramePlan, PlanConfig, ReelError, ReelResult, StreamId, Timestamp};
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::path::Path;

/// Writes a solid image whose shade is derived from the frame index.
#[derive(Debug, Default)]
pub struct SolidRasterizer {
    /// Frames that panic mid-render
    pub panic_on: HashSet<usize>,
    /// Frames that return a render error
    pub fail_on: HashSet<usize>,
    /// Frames written as zero-byte files
    pub empty_on: HashSet<usize>,
}

impl SolidRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panicking(mut self, index: usize) -> Self {
        self.panic_on.insert(index);
        self
    }

    pub fn failing(mut self, index: usize) -> Self {
        self.fail_on.insert(index);
        self
    }

    pub fn empty(mut self, index: usize) -> Self {
        self.empty_on.insert(index);
        self
    }
}

/// Shade used for the frame at `index`.
pub fn shade(index: usize) -> u8 {
    (index % 251) as u8
}

impl Rasterizer for SolidRasterizer {
    fn rasterize(&self, figure: &FigureSpec, path: &Path) -> ReelResult<()> {
        if self.panic_on.contains(&figure.index) {
            panic!("synthetic panic on frame {}", figure.index);
        }
        if self.fail_on.contains(&figure.index) {
            return Err(ReelError::Render {
                frame: figure.index,
                reason: "synthetic failure".into(),
            });
        }
        if self.empty_on.contains(&figure.index) {
            std::fs::write(path, b"")?;
            return Ok(());
        }
        let s = shade(figure.index);
        let img = RgbImage::from_pixel(figure.size.width, figure.size.height, Rgb([s, s, s]));
        img.save(path).map_err(|e| ReelError::Render {
            frame: figure.index,
            reason: e.to_string(),
        })
    }
}

/// Table of `rows` attitude and IMU samples spaced `step_ms` apart.
pub fn synthetic_table(rows: usize, step_ms: i64) -> AlignedTable {
    let fields: Vec<String> = [
        "Roll", "DesRoll", "Pitch", "DesPitch", "Yaw", "DesYaw", "GyrX", "GyrY", "GyrZ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let records = (0..rows)
        .map(|i| AlignedRecord {
            timestamp: Timestamp(i as i64 * step_ms * 1_000),
            values: (0..fields.len())
                .map(|c| Some(FieldValue::Number((i + c) as f64)))
                .collect(),
        })
        .collect();
    AlignedTable::from_parts(StreamId::Att, fields, vec![StreamId::Att, StreamId::Imu], records)
}

/// Plan over a table covering `secs` seconds at `fps`.
pub fn synthetic_plan(secs: i64, fps: f64) -> FramePlan {
    let rows = (secs * MICROS_PER_SEC / 100_000) as usize + 1;
    let table = synthetic_table(rows, 100);
    match plan(&table, &PlanConfig::default().with_fps(fps).with_window_secs(2.0)) {
        Ok(p) => p,
        Err(e) => panic!("synthetic plan failed: {}", e),
    }
}
