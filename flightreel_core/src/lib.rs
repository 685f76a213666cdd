//! FlightReel Core - telemetry ingestion, alignment and frame planning
//!
//! Turns a directory of per-message-type CSV exports into one time-aligned
//! table and a list of frame tasks ready for rendering:
//! 1. **Load**: parse, normalize timestamps, project fields ([`stream_loader`])
//! 2. **Align**: nearest-timestamp merge onto the attitude timeline ([`alignment`])
//! 3. **Filter**: drop rows missing essential fields ([`completeness`])
//! 4. **Plan**: evenly spaced frame instants with causal windows ([`frame_plan`])
//!
//! Everything here is single-threaded and synchronous. The aligned table is
//! immutable after filtering and shared by reference between frame tasks.

pub mod alignment;
pub mod catalog;
pub mod completeness;
pub mod error;
pub mod frame_plan;
pub mod geodesy;
pub mod inspect;
pub mod report;
pub mod stream_loader;
pub mod table;
pub mod timestamp;

// Re-export key types for convenience
pub use alignment::{align, AlignConfig};
pub use catalog::{fields, FieldSelection, StreamId};
pub use completeness::{essential_fields, filter, FilterSummary};
pub use error::{ReelError, ReelResult};
pub use frame_plan::{plan, FramePlan, FrameTask, PlanConfig};
pub use geodesy::{haversine, GeoPoint};
pub use report::{PipelineStage, RunReport};
pub use stream_loader::{load_all, load_stream, LoadOutcome, LoadedStreams, LoaderConfig};
pub use table::{AlignedRecord, AlignedTable, FieldValue, StreamRecord, StreamTable};
pub use timestamp::Timestamp;
