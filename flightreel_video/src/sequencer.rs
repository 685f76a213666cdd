//! Validation and ordering of render results.

use flightreel_core::report::{FrameFailure, SequenceSummary};
use flightreel_core::{ReelError, ReelResult};
use flightreel_env::{FrameIndex, RenderStatus, RenderedFrame};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Frames ready for encoding, in index order.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    pub frames: Vec<(FrameIndex, PathBuf)>,
    pub skipped: Vec<FrameFailure>,
    pub summary: SequenceSummary,
}

/// Checks every planned frame and orders the usable ones by index.
///
/// A frame is usable when its render succeeded and its file exists with a
/// non-zero size. Everything else is skipped with a warning. Results for
/// frames that were never planned are ignored.
pub fn collect(planned: &[usize], results: Vec<RenderedFrame>) -> ReelResult<Sequence> {
    let mut by_index: BTreeMap<FrameIndex, RenderedFrame> = BTreeMap::new();
    for result in results {
        by_index.insert(result.index, result);
    }

    let mut planned: Vec<usize> = planned.to_vec();
    planned.sort_unstable();
    planned.dedup();

    let mut seq = Sequence::default();
    for &i in &planned {
        let index = FrameIndex(i);
        let reason = match by_index.remove(&index).map(|r| r.status) {
            None => {
                seq.summary.missing_result += 1;
                "no render result".to_string()
            }
            Some(RenderStatus::Failed(reason)) => {
                seq.summary.failed_render += 1;
                reason
            }
            Some(RenderStatus::Rendered(path)) => match std::fs::metadata(&path) {
                Err(_) => {
                    seq.summary.missing_file += 1;
                    format!("file {} missing", path.display())
                }
                Ok(meta) if meta.len() == 0 => {
                    seq.summary.empty_file += 1;
                    format!("file {} is empty", path.display())
                }
                Ok(_) => {
                    seq.summary.valid += 1;
                    seq.frames.push((index, path));
                    continue;
                }
            },
        };
        warn!(frame = i, %reason, "Skipping frame");
        seq.skipped.push(FrameFailure { index: i, reason });
    }

    for stray in by_index.keys() {
        warn!(frame = stray.0, "Ignoring result for unplanned frame");
    }

    if seq.frames.is_empty() {
        return Err(ReelError::Sequencing(format!(
            "none of {} planned frames produced a usable image",
            planned.len()
        )));
    }
    info!(
        valid = seq.summary.valid,
        skipped = seq.summary.skipped(),
        "Sequenced frames"
    );
    Ok(seq)
}
