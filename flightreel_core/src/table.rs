//! In-memory tables: one per loaded stream, plus the merged aligned table.
//!
//! Rows store values positionally against a shared field list, so a record is
//! a `Vec<Option<FieldValue>>` rather than a fixed struct. A `None` cell means
//! "no value at this instant" (empty CSV cell, or no match within tolerance).

use crate::catalog::StreamId;
use crate::timestamp::{Timestamp, MICROS_PER_SEC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Cell contents that mean "no value".
pub const NULL_MARKERS: [&str; 10] = ["nan", "NaN", "NAN", "NA", "N/A", "null", "NULL", "None", "#N/A", "<NA>"];

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Parses a raw CSV cell.
    ///
    /// Empty cells, [`NULL_MARKERS`] and non-finite numbers are `None`.
    pub fn parse(raw: &str) -> Option<FieldValue> {
        let s = raw.trim();
        if s.is_empty() || NULL_MARKERS.contains(&s) {
            return None;
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(FieldValue::Number(v)),
            Ok(_) => None,
            Err(_) => Some(FieldValue::Text(s.to_string())),
        }
    }

    /// Numeric view; text cells have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// Text view; numbers have none.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    /// Rendering used by the CSV exporter.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Number(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// One row of one message type.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub timestamp: Timestamp,
    pub values: Vec<Option<FieldValue>>,
}

/// Counts collected while loading one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Data rows in the file
    pub rows_read: usize,
    /// Rows dropped because their timestamp could not be resolved
    pub unparsable_timestamps: usize,
    /// Rows kept after sorting
    pub final_rows: usize,
    /// Configured fields that were not present in the file
    pub missing_fields: Vec<String>,
}

/// Time-sorted rows of one stream, projected to its selected fields.
#[derive(Debug, Clone)]
pub struct StreamTable {
    pub stream: StreamId,
    pub fields: Vec<String>,
    pub records: Vec<StreamRecord>,
    pub stats: LoadStats,
}

impl StreamTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a field in this table's rows.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Numeric value of `field` in row `row`.
    pub fn number(&self, row: usize, field: &str) -> Option<f64> {
        let col = self.field_index(field)?;
        self.records
            .get(row)?
            .values
            .get(col)?
            .as_ref()?
            .as_f64()
    }
}

/// One merged row per reference instant.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    pub timestamp: Timestamp,
    pub values: Vec<Option<FieldValue>>,
}

impl AlignedRecord {
    /// Cell at a column index.
    pub fn get(&self, col: usize) -> Option<&FieldValue> {
        self.values.get(col).and_then(|v| v.as_ref())
    }
}

/// The merged table. Immutable once filtered; shared read-only by all frames.
#[derive(Debug, Clone)]
pub struct AlignedTable {
    reference: StreamId,
    fields: Vec<String>,
    index: HashMap<String, usize>,
    streams: Vec<StreamId>,
    records: Vec<AlignedRecord>,
    /// Reference rows dropped because they repeated a timestamp
    collapsed: usize,
}

impl AlignedTable {
    /// Empty table with the given reference stream.
    pub fn new(reference: StreamId) -> Self {
        Self {
            reference,
            fields: Vec::new(),
            index: HashMap::new(),
            streams: vec![reference],
            records: Vec::new(),
            collapsed: 0,
        }
    }

    /// Builds a table directly from a schema and rows.
    ///
    /// Every row must carry exactly one cell per field; shorter rows are
    /// padded with nulls and longer ones truncated.
    pub fn from_parts(
        reference: StreamId,
        fields: Vec<String>,
        streams: Vec<StreamId>,
        mut records: Vec<AlignedRecord>,
    ) -> Self {
        for record in &mut records {
            record.values.resize(fields.len(), None);
        }
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i))
            .collect();
        Self {
            reference,
            fields,
            index,
            streams,
            records,
            collapsed: 0,
        }
    }

    pub fn reference(&self) -> StreamId {
        self.reference
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> &[AlignedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Streams whose fields are in this table (reference and merged ones).
    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }

    /// Whether a stream survived the merge.
    pub fn has_stream(&self, stream: StreamId) -> bool {
        self.streams.contains(&stream)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cell of `field` in row `row`.
    pub fn value(&self, row: usize, field: &str) -> Option<&FieldValue> {
        let col = self.field_index(field)?;
        self.records.get(row)?.get(col)
    }

    /// Numeric cell of `field` in row `row`.
    pub fn number(&self, row: usize, field: &str) -> Option<f64> {
        self.value(row, field)?.as_f64()
    }

    /// First and last timestamps.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.records.first()?.timestamp, self.records.last()?.timestamp))
    }

    /// Registers a new column (null in every existing row). Returns its index.
    pub(crate) fn push_field(&mut self, name: String) -> usize {
        let col = self.fields.len();
        self.index.insert(name.clone(), col);
        self.fields.push(name);
        for record in &mut self.records {
            record.values.push(None);
        }
        col
    }

    pub(crate) fn push_stream(&mut self, stream: StreamId) {
        if !self.streams.contains(&stream) {
            self.streams.push(stream);
        }
    }

    /// Reference rows collapsed into a later row with the same timestamp.
    pub fn collapsed_reference_rows(&self) -> usize {
        self.collapsed
    }

    pub(crate) fn set_collapsed_reference_rows(&mut self, count: usize) {
        self.collapsed = count;
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<AlignedRecord> {
        &mut self.records
    }

    /// Copy of the table restricted to rows for which `keep` holds.
    /// Row order is preserved.
    pub fn retain_rows<F>(&self, mut keep: F) -> AlignedTable
    where
        F: FnMut(&AlignedRecord) -> bool,
    {
        let mut out = self.clone();
        out.records.retain(|r| keep(r));
        out
    }

    /// Rows with `start <= timestamp <= end`.
    pub fn clip(&self, start: Timestamp, end: Timestamp) -> AlignedTable {
        self.retain_rows(|r| r.timestamp >= start && r.timestamp <= end)
    }

    /// Index range of rows with timestamp in `(instant - window, instant]`.
    pub fn window_range(&self, instant: Timestamp, window_secs: f64) -> Range<usize> {
        let lower = Timestamp(instant.0 - (window_secs * MICROS_PER_SEC as f64).round() as i64);
        let lo = self.records.partition_point(|r| r.timestamp <= lower);
        let hi = self.records.partition_point(|r| r.timestamp <= instant);
        lo..hi.max(lo)
    }

    /// Rows in an index range.
    pub fn slice(&self, range: Range<usize>) -> &[AlignedRecord] {
        let end = range.end.min(self.records.len());
        let start = range.start.min(end);
        &self.records[start..end]
    }
}
