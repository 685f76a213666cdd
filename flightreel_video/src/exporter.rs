//! CSV exporter for aligned tables.
//!
//! Writes the filtered, aligned table with the same field names the
//! renderer uses, so interactive front-ends can pick it up directly.

use chrono::SecondsFormat;
use flightreel_core::{AlignedTable, ReelResult};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Timestamp as RFC 3339 with microseconds, falling back to raw micros.
fn timestamp_cell(table: &AlignedTable, row: usize) -> String {
    let ts = table.records()[row].timestamp;
    match ts.to_datetime() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => ts.micros().to_string(),
    }
}

/// Writes `table` as CSV to any writer. Nulls become empty cells.
pub fn write_csv<W: Write>(table: &AlignedTable, out: W) -> ReelResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = Vec::with_capacity(table.fields().len() + 1);
    header.push("timestamp");
    header.extend(table.fields().iter().map(String::as_str));
    writer.write_record(&header)?;

    for (row, record) in table.records().iter().enumerate() {
        let mut cells = Vec::with_capacity(record.values.len() + 1);
        cells.push(timestamp_cell(table, row));
        cells.extend(
            record
                .values
                .iter()
                .map(|v| v.as_ref().map(|v| v.to_cell()).unwrap_or_default()),
        );
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `table` to `path`.
pub fn export_csv(table: &AlignedTable, path: &Path) -> ReelResult<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, std::io::BufWriter::new(file))?;
    info!(rows = table.len(), fields = table.fields().len(), path = %path.display(), "Aligned table exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightreel_core::{AlignedRecord, FieldValue, StreamId, Timestamp};

    #[test]
    fn test_csv_layout() {
        let table = AlignedTable::from_parts(
            StreamId::Att,
            vec!["Roll".into(), "MSG_Text".into()],
            vec![StreamId::Att, StreamId::Msg],
            vec![
                AlignedRecord {
                    timestamp: Timestamp(1_500_000),
                    values: vec![Some(FieldValue::Number(2.5)), Some(FieldValue::Text("Armed".into()))],
                },
                AlignedRecord {
                    timestamp: Timestamp(1_600_000),
                    values: vec![Some(FieldValue::Number(-1.0)), None],
                },
            ],
        );
        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,Roll,MSG_Text");
        assert_eq!(lines[1], "1970-01-01T00:00:01.500000Z,2.5,Armed");
        assert_eq!(lines[2], "1970-01-01T00:00:01.600000Z,-1,");
    }
}
