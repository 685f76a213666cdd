//! Stream Loader: one CSV per message type in, one time-sorted table out.
//!
//! Required selections fail the run on any problem. Optional selections never
//! fail; they come back as [`LoadOutcome::Excluded`] with a reason the caller
//! is expected to report.

use crate::catalog::{fields, FieldSelection, StreamId};
use crate::error::{ReelError, ReelResult};
use crate::table::{FieldValue, LoadStats, StreamRecord, StreamTable};
use crate::timestamp::Timestamp;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Minimum number of rows for a stream to be considered useful.
pub const DEFAULT_MIN_ROWS: usize = 10;

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Tables with fewer timestamped rows are rejected
    pub min_rows: usize,
    /// Name of the timestamp column in every CSV
    pub timestamp_column: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            min_rows: DEFAULT_MIN_ROWS,
            timestamp_column: fields::TIMESTAMP.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column = name.into();
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.min_rows == 0 {
            return Err(ReelError::configuration("minimum row count must be at least 1"));
        }
        if self.timestamp_column.trim().is_empty() {
            return Err(ReelError::configuration("timestamp column name is empty"));
        }
        Ok(())
    }
}

/// Result of loading one stream.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(StreamTable),
    Excluded { stream: StreamId, reason: String },
}

impl LoadOutcome {
    pub fn stream(&self) -> StreamId {
        match self {
            LoadOutcome::Loaded(table) => table.stream,
            LoadOutcome::Excluded { stream, .. } => *stream,
        }
    }

    pub fn into_table(self) -> Option<StreamTable> {
        match self {
            LoadOutcome::Loaded(table) => Some(table),
            LoadOutcome::Excluded { .. } => None,
        }
    }
}

/// Loads one stream CSV.
///
/// A [`FieldSelection::Required`] selection turns every failure into an
/// error. A [`FieldSelection::Optional`] selection turns every failure into
/// an exclusion.
pub fn load_stream(
    path: &Path,
    stream: StreamId,
    selection: &FieldSelection,
    config: &LoaderConfig,
) -> ReelResult<LoadOutcome> {
    match selection {
        FieldSelection::Required(_) => {
            if !path.is_file() {
                return Err(ReelError::configuration(format!(
                    "required stream {} not found at {}",
                    stream,
                    path.display()
                )));
            }
            read_table(path, stream, selection, config).map(LoadOutcome::Loaded)
        }
        FieldSelection::Optional(_) => {
            if !path.is_file() {
                let reason = format!("file not found: {}", path.display());
                warn!(stream = %stream, %reason, "Optional stream excluded");
                return Ok(LoadOutcome::Excluded { stream, reason });
            }
            match read_table(path, stream, selection, config) {
                Ok(table) => Ok(LoadOutcome::Loaded(table)),
                Err(e) => {
                    let reason = match e {
                        ReelError::DataQuality { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    warn!(stream = %stream, %reason, "Optional stream excluded");
                    Ok(LoadOutcome::Excluded { stream, reason })
                }
            }
        }
    }
}

/// Streams after the loading stage.
#[derive(Debug, Clone, Default)]
pub struct LoadedStreams {
    /// Required tables, reference stream first
    pub required: Vec<StreamTable>,
    /// Optional tables in catalog order
    pub optional: Vec<StreamTable>,
    /// Optional streams that were not loaded, with the reason
    pub excluded: Vec<(StreamId, String)>,
}

impl LoadedStreams {
    /// Every loaded table, required first.
    pub fn tables(&self) -> impl Iterator<Item = &StreamTable> {
        self.required.iter().chain(self.optional.iter())
    }
}

/// Loads every catalog stream that has a path, with default selections.
///
/// Missing required paths are a configuration error. Optional streams
/// without a path are recorded as excluded.
pub fn load_all(
    sources: &BTreeMap<StreamId, PathBuf>,
    config: &LoaderConfig,
) -> ReelResult<LoadedStreams> {
    config.validate()?;
    let mut loaded = LoadedStreams::default();

    for stream in StreamId::required() {
        let path = sources.get(&stream).ok_or_else(|| {
            ReelError::configuration(format!("no input file given for required stream {}", stream))
        })?;
        let outcome = load_stream(path, stream, &stream.default_selection(), config)?;
        if let Some(table) = outcome.into_table() {
            loaded.required.push(table);
        }
    }

    for stream in StreamId::optional() {
        let Some(path) = sources.get(&stream) else {
            debug!(stream = %stream, "No file given for optional stream");
            loaded.excluded.push((stream, "not provided".to_string()));
            continue;
        };
        match load_stream(path, stream, &stream.default_selection(), config)? {
            LoadOutcome::Loaded(table) => loaded.optional.push(table),
            LoadOutcome::Excluded { stream, reason } => loaded.excluded.push((stream, reason)),
        }
    }

    Ok(loaded)
}

/// Projected column: its position in the CSV record.
struct Column {
    source: usize,
}

fn read_table(
    path: &Path,
    stream: StreamId,
    selection: &FieldSelection,
    config: &LoaderConfig,
) -> ReelResult<StreamTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let ts_col = position(&config.timestamp_column).ok_or_else(|| {
        ReelError::data_quality(
            stream.code(),
            format!("missing '{}' column", config.timestamp_column),
        )
    })?;

    let mut columns = Vec::new();
    let mut names = Vec::new();
    let mut stats = LoadStats::default();

    match selection {
        FieldSelection::Required(required) => {
            for name in required {
                let source = position(name).ok_or_else(|| {
                    ReelError::data_quality(stream.code(), format!("missing required field '{}'", name))
                })?;
                columns.push(Column { source });
                names.push(name.clone());
            }
        }
        FieldSelection::Optional(map) => {
            for (source_name, target) in map {
                match position(source_name) {
                    Some(source) => {
                        columns.push(Column { source });
                        names.push(target.clone());
                    }
                    None => stats.missing_fields.push(source_name.clone()),
                }
            }
            if columns.is_empty() {
                return Err(ReelError::data_quality(
                    stream.code(),
                    "none of the configured fields are present",
                ));
            }
            if !stats.missing_fields.is_empty() {
                debug!(stream = %stream, missing = ?stats.missing_fields, "Some optional fields absent");
            }
        }
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        stats.rows_read += 1;
        let Some(timestamp) = row.get(ts_col).and_then(Timestamp::parse) else {
            stats.unparsable_timestamps += 1;
            continue;
        };
        let values = columns
            .iter()
            .map(|c| row.get(c.source).and_then(FieldValue::parse))
            .collect();
        records.push(StreamRecord { timestamp, values });
    }

    if stats.unparsable_timestamps > 0 {
        warn!(
            stream = %stream,
            dropped = stats.unparsable_timestamps,
            "Dropped rows with unparsable timestamps"
        );
    }

    // Stable, so rows sharing a timestamp keep file order.
    records.sort_by_key(|r| r.timestamp);
    stats.final_rows = records.len();

    if records.len() < config.min_rows {
        return Err(ReelError::data_quality(
            stream.code(),
            format!(
                "only {} usable rows (minimum {} required)",
                records.len(),
                config.min_rows
            ),
        ));
    }

    info!(stream = %stream, rows = records.len(), fields = names.len(), "Loaded stream");

    Ok(StreamTable {
        stream,
        fields: names,
        records,
        stats,
    })
}
