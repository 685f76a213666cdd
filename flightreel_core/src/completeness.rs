//! Essential-Completeness Filter.

use crate::catalog::{fields, StreamId};
use crate::error::{ReelError, ReelResult};
use crate::table::{AlignedTable, FieldValue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Loss ratio above which the filter warns.
pub const LOSS_WARN_RATIO: f64 = 0.2;

/// Row counts around the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSummary {
    pub essential_fields: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub loss_ratio: f64,
    pub warned: bool,
}

/// Fields a row must carry to survive: every required-stream field, plus the
/// pilot-input channels when RCIN made it into the table.
pub fn essential_fields(table: &AlignedTable) -> Vec<String> {
    let mut essential: Vec<String> = StreamId::required()
        .iter()
        .flat_map(|id| id.default_selection().output_names())
        .collect();
    if table.has_stream(StreamId::Rcin) {
        for name in [fields::RCIN_ROLL, fields::RCIN_PITCH] {
            if table.has_field(name) {
                essential.push(name.to_string());
            }
        }
    }
    essential
}

/// Drops rows with a null or non-numeric value in any essential field.
/// Order is preserved.
///
/// An essential field missing from the table entirely makes every row
/// incomplete. An empty result is a [`ReelError::Completeness`].
pub fn filter(table: &AlignedTable, essential: &[String]) -> ReelResult<(AlignedTable, FilterSummary)> {
    let columns: Option<Vec<usize>> = essential.iter().map(|f| table.field_index(f)).collect();
    let filtered = match columns {
        Some(cols) => table.retain_rows(|r| {
            cols.iter()
                .all(|&c| r.get(c).and_then(FieldValue::as_f64).is_some())
        }),
        None => table.retain_rows(|_| false),
    };

    let rows_before = table.len();
    let rows_after = filtered.len();
    let loss_ratio = if rows_before == 0 {
        0.0
    } else {
        (rows_before - rows_after) as f64 / rows_before as f64
    };
    let warned = loss_ratio > LOSS_WARN_RATIO;
    if warned {
        warn!(
            before = rows_before,
            after = rows_after,
            loss = %format!("{:.1}%", loss_ratio * 100.0),
            "Completeness filter dropped a large share of rows"
        );
    } else {
        info!(before = rows_before, after = rows_after, "Completeness filter applied");
    }

    if filtered.is_empty() {
        return Err(ReelError::Completeness {
            fields: essential.len(),
        });
    }

    Ok((
        filtered,
        FilterSummary {
            essential_fields: essential.to_vec(),
            rows_before,
            rows_after,
            loss_ratio,
            warned,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::AlignedRecord;
    use crate::timestamp::Timestamp;
    use approx::assert_relative_eq;

    fn table(with_rcin: bool, rows: Vec<Vec<Option<f64>>>) -> AlignedTable {
        let mut names: Vec<String> = essential_names(false);
        let mut streams = vec![StreamId::Att, StreamId::Imu];
        if with_rcin {
            names.push(fields::RCIN_ROLL.into());
            names.push(fields::RCIN_PITCH.into());
            streams.push(StreamId::Rcin);
        }
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, vals)| AlignedRecord {
                timestamp: Timestamp(i as i64),
                values: vals.into_iter().map(|v| v.map(FieldValue::Number)).collect(),
            })
            .collect();
        AlignedTable::from_parts(StreamId::Att, names, streams, records)
    }

    fn essential_names(with_rcin: bool) -> Vec<String> {
        let mut v: Vec<String> = ["Roll", "DesRoll", "Pitch", "DesPitch", "Yaw", "DesYaw", "GyrX", "GyrY", "GyrZ"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if with_rcin {
            v.push(fields::RCIN_ROLL.into());
            v.push(fields::RCIN_PITCH.into());
        }
        v
    }

    #[test]
    fn test_essential_set_follows_rcin() {
        let plain = table(false, vec![vec![Some(1.0); 9]]);
        assert_eq!(essential_fields(&plain), essential_names(false));
        let with_rcin = table(true, vec![vec![Some(1.0); 11]]);
        assert_eq!(essential_fields(&with_rcin), essential_names(true));
    }

    #[test]
    fn test_drops_incomplete_rows_and_warns() {
        let mut rows = vec![vec![Some(1.0); 9]; 10];
        rows[2][0] = None;
        rows[5][8] = None;
        rows[7][4] = None;
        let t = table(false, rows);
        let (out, summary) = filter(&t, &essential_fields(&t)).unwrap();
        assert_eq!(out.len(), 7);
        assert!(summary.warned);
        assert_relative_eq!(summary.loss_ratio, 0.3);
        let kept: Vec<i64> = out.records().iter().map(|r| r.timestamp.0).collect();
        assert_eq!(kept, vec![0, 1, 3, 4, 6, 8, 9]);
    }

    #[test]
    fn test_empty_result_is_error() {
        let t = table(false, vec![vec![None; 9]; 3]);
        let err = filter(&t, &essential_fields(&t)).unwrap_err();
        assert!(matches!(err, ReelError::Completeness { fields: 9 }));
    }

    #[test]
    fn test_text_in_essential_field_is_missing() {
        let mut t = table(false, vec![vec![Some(1.0); 9]; 4]);
        t.records_mut()[1].values[0] = Some(FieldValue::Text("bad".into()));
        let (out, summary) = filter(&t, &essential_fields(&t)).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(summary.rows_before - summary.rows_after, 1);
    }
}
