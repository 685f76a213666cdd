//! Run report: the pipeline's stage plus every loss count along the way.

use crate::catalog::StreamId;
use crate::completeness::FilterSummary;
use crate::error::{ReelError, ReelResult};
use crate::frame_plan::PlanSummary;
use crate::table::StreamTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline state machine.
///
/// Stages advance strictly in declaration order; `Failed` can be entered from
/// any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    Loaded,
    Aligned,
    Filtered,
    Planned,
    Rendering,
    Sequenced,
    Encoded,
    Failed,
}

impl PipelineStage {
    /// The stage that follows a successful step, if any.
    pub fn next(self) -> Option<PipelineStage> {
        use PipelineStage::*;
        match self {
            Init => Some(Loaded),
            Loaded => Some(Aligned),
            Aligned => Some(Filtered),
            Filtered => Some(Planned),
            Planned => Some(Rendering),
            Rendering => Some(Sequenced),
            Sequenced => Some(Encoded),
            Encoded | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Encoded | PipelineStage::Failed)
    }
}

/// Load result for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamReport {
    pub stream: StreamId,
    pub required: bool,
    pub rows_read: usize,
    pub unparsable_timestamps: usize,
    pub final_rows: usize,
    pub missing_fields: Vec<String>,
    /// Set when an optional stream was not merged
    pub excluded: Option<String>,
}

impl StreamReport {
    pub fn loaded(table: &StreamTable) -> Self {
        Self {
            stream: table.stream,
            required: table.stream.is_required(),
            rows_read: table.stats.rows_read,
            unparsable_timestamps: table.stats.unparsable_timestamps,
            final_rows: table.stats.final_rows,
            missing_fields: table.stats.missing_fields.clone(),
            excluded: None,
        }
    }

    pub fn excluded(stream: StreamId, reason: impl Into<String>) -> Self {
        Self {
            stream,
            required: stream.is_required(),
            rows_read: 0,
            unparsable_timestamps: 0,
            final_rows: 0,
            missing_fields: Vec::new(),
            excluded: Some(reason.into()),
        }
    }
}

/// A frame that did not make it into the video, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FrameFailure>,
    pub workers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub valid: usize,
    pub failed_render: usize,
    pub missing_result: usize,
    pub missing_file: usize,
    pub empty_file: usize,
}

impl SequenceSummary {
    pub fn skipped(&self) -> usize {
        self.failed_render + self.missing_result + self.missing_file + self.empty_file
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeSummary {
    pub output: PathBuf,
    pub frames_written: usize,
    pub skipped: Vec<FrameFailure>,
}

/// Everything a run did, serializable to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub stage: PipelineStage,
    /// Stage that failed and the error message
    pub failure: Option<(String, String)>,
    pub streams: Vec<StreamReport>,
    pub reference_rows: Option<usize>,
    /// Reference rows dropped as duplicate timestamps
    pub collapsed_reference_rows: usize,
    pub filter: Option<FilterSummary>,
    pub plan: Option<PlanSummary>,
    pub render: Option<RenderSummary>,
    pub sequence: Option<SequenceSummary>,
    pub encode: Option<EncodeSummary>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            stage: PipelineStage::Init,
            failure: None,
            streams: Vec::new(),
            reference_rows: None,
            collapsed_reference_rows: 0,
            filter: None,
            plan: None,
            render: None,
            sequence: None,
            encode: None,
        }
    }

    /// Moves to `next`, which must be the successor of the current stage.
    pub fn advance(&mut self, next: PipelineStage) -> ReelResult<()> {
        if self.stage.next() != Some(next) {
            return Err(ReelError::configuration(format!(
                "invalid stage transition {:?} -> {:?}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Records a terminal failure.
    pub fn fail(&mut self, err: &ReelError) {
        if !self.stage.is_terminal() {
            self.failure = Some((err.class().to_string(), err.to_string()));
            self.stage = PipelineStage::Failed;
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == PipelineStage::Encoded
    }

    /// Frames planned but absent from the output.
    pub fn frames_lost(&self) -> usize {
        let sequenced = self.sequence.as_ref().map_or(0, SequenceSummary::skipped);
        let encoded = self.encode.as_ref().map_or(0, |e| e.skipped.len());
        sequenced + encoded
    }

    pub fn to_json(&self) -> ReelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReelError::configuration(format!("cannot serialize report: {}", e)))
    }

    pub fn write_json(&self, path: &Path) -> ReelResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
