//! Temporal Aligner: nearest-timestamp merge onto the reference timeline.
//!
//! Each non-reference stream is joined with a two-pointer sweep over the two
//! time-sorted sequences. A reference instant gets the closest row of the
//! other stream when `|dt| <= tolerance` and a null otherwise. There is at most
//! one attached row per instant, so the merge never duplicates rows.

use crate::catalog::{fields, StreamId};
use crate::error::{ReelError, ReelResult};
use crate::geodesy::{haversine, GeoPoint};
use crate::table::{AlignedRecord, AlignedTable, FieldValue, StreamTable};
use crate::timestamp::{Timestamp, MICROS_PER_MILLI};
use tracing::{debug, info, warn};

/// Default nearest-match tolerance.
pub const DEFAULT_TOLERANCE_MS: i64 = 50;

/// Aligner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignConfig {
    /// Maximum |dt| for a match, in microseconds
    pub tolerance_micros: i64,
    /// Whether to add the distance-from-reference column
    pub derive_distance: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            tolerance_micros: DEFAULT_TOLERANCE_MS * MICROS_PER_MILLI,
            derive_distance: true,
        }
    }
}

impl AlignConfig {
    pub fn with_tolerance_ms(mut self, ms: i64) -> Self {
        self.tolerance_micros = ms.saturating_mul(MICROS_PER_MILLI);
        self
    }

    pub fn with_derive_distance(mut self, enabled: bool) -> Self {
        self.derive_distance = enabled;
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.tolerance_micros < 0 {
            return Err(ReelError::configuration("alignment tolerance must not be negative"));
        }
        Ok(())
    }
}

/// Merges all streams onto the first required stream's timeline.
///
/// Every catalog-required stream must be present in `required`. Optional
/// tables are merged in catalog order regardless of the order given.
pub fn align(
    required: &[StreamTable],
    optional: &[StreamTable],
    config: &AlignConfig,
) -> ReelResult<AlignedTable> {
    config.validate()?;

    let reference = required.first().ok_or_else(|| ReelError::Alignment {
        stream: StreamId::required()[0].code().to_string(),
    })?;
    for id in StreamId::required() {
        if !required.iter().any(|t| t.stream == id) {
            return Err(ReelError::Alignment {
                stream: id.code().to_string(),
            });
        }
    }

    let mut table = reference_table(reference);
    debug!(stream = %reference.stream, rows = table.len(), "Reference timeline");

    for other in required.iter().skip(1) {
        merge_nearest(&mut table, other, config.tolerance_micros);
    }

    let mut ordered: Vec<&StreamTable> = optional.iter().collect();
    ordered.sort_by_key(|t| t.stream);
    for other in ordered {
        merge_nearest(&mut table, other, config.tolerance_micros);
    }

    if config.derive_distance {
        add_distance_from_reference(&mut table, optional);
    }

    info!(
        rows = table.len(),
        fields = table.fields().len(),
        streams = table.streams().len(),
        "Aligned streams"
    );
    Ok(table)
}

/// Seeds the aligned table from the reference stream. Among rows sharing a
/// timestamp the last one is kept so timestamps stay strictly increasing.
fn reference_table(reference: &StreamTable) -> AlignedTable {
    let mut records: Vec<AlignedRecord> = Vec::with_capacity(reference.len());
    for row in &reference.records {
        let record = AlignedRecord {
            timestamp: row.timestamp,
            values: row.values.clone(),
        };
        match records.last_mut() {
            Some(last) if last.timestamp == row.timestamp => *last = record,
            _ => records.push(record),
        }
    }
    let collapsed = reference.len() - records.len();
    if collapsed > 0 {
        warn!(stream = %reference.stream, collapsed, "Collapsed duplicate reference timestamps");
    }
    let mut table = AlignedTable::from_parts(
        reference.stream,
        reference.fields.clone(),
        vec![reference.stream],
        records,
    );
    table.set_collapsed_reference_rows(collapsed);
    table
}

/// For each reference instant, the index of the nearest `other` row within
/// `tolerance`, or `None`.
///
/// Both inputs must be sorted ascending. Ties go to the earlier row; among
/// rows with an identical timestamp the last one wins.
pub fn nearest_indices(
    reference: &[Timestamp],
    other: &[Timestamp],
    tolerance: i64,
) -> Vec<Option<usize>> {
    // Last index of every run of equal timestamps.
    let mut unique: Vec<usize> = Vec::with_capacity(other.len());
    for (i, ts) in other.iter().enumerate() {
        match unique.last_mut() {
            Some(last) if other[*last] == *ts => *last = i,
            _ => unique.push(i),
        }
    }
    if unique.is_empty() {
        return vec![None; reference.len()];
    }

    let n = unique.len();
    let mut j = 0;
    reference
        .iter()
        .map(|&r| {
            while j + 1 < n && other[unique[j + 1]] <= r {
                j += 1;
            }
            let here = other[unique[j]];
            let best = if here > r || j + 1 == n {
                j
            } else {
                let before = r.0 - here.0;
                let after = other[unique[j + 1]].0 - r.0;
                if after < before {
                    j + 1
                } else {
                    j
                }
            };
            let idx = unique[best];
            (other[idx].abs_diff_micros(r) <= tolerance as u64).then_some(idx)
        })
        .collect()
}

fn merge_nearest(table: &mut AlignedTable, other: &StreamTable, tolerance: i64) {
    let mut columns = Vec::with_capacity(other.fields.len());
    for name in &other.fields {
        let target = if table.has_field(name) {
            let prefixed = format!("{}_{}", other.stream.code(), name);
            warn!(stream = %other.stream, field = %name, renamed = %prefixed, "Field name collision");
            prefixed
        } else {
            name.clone()
        };
        if table.has_field(&target) {
            warn!(stream = %other.stream, field = %target, "Field still collides, dropped");
            columns.push(None);
        } else {
            columns.push(Some(table.push_field(target)));
        }
    }

    let reference: Vec<Timestamp> = table.records().iter().map(|r| r.timestamp).collect();
    let times: Vec<Timestamp> = other.records.iter().map(|r| r.timestamp).collect();
    let matches = nearest_indices(&reference, &times, tolerance);

    let mut matched = 0usize;
    for (record, found) in table.records_mut().iter_mut().zip(matches) {
        let Some(k) = found else { continue };
        matched += 1;
        for (src, dst) in columns.iter().enumerate() {
            if let Some(col) = dst {
                record.values[*col] = other.records[k].values.get(src).cloned().flatten();
            }
        }
    }
    table.push_stream(other.stream);
    debug!(stream = %other.stream, matched, of = reference.len(), "Merged stream");
}

/// Adds `DIST_FromRef_m` from the first finite POS fix, else the first GPS fix.
fn add_distance_from_reference(table: &mut AlignedTable, optional: &[StreamTable]) {
    let source = [StreamId::Pos, StreamId::Gps].into_iter().find_map(|id| {
        let (lat_f, lon_f) = id.lat_lon_fields()?;
        let stream = optional.iter().find(|t| t.stream == id)?;
        let (lat_c, lon_c) = (stream.field_index(lat_f)?, stream.field_index(lon_f)?);
        let origin = stream.records.iter().find_map(|r| {
            let lat = r.values.get(lat_c)?.as_ref()?.as_f64()?;
            let lon = r.values.get(lon_c)?.as_ref()?.as_f64()?;
            let p = GeoPoint::new(lat, lon);
            p.is_finite().then_some(p)
        })?;
        Some((id, lat_f, lon_f, origin))
    });

    let Some((id, lat_f, lon_f, origin)) = source else {
        debug!("No position stream with a valid fix; distance not derived");
        return;
    };
    let (Some(lat_c), Some(lon_c)) = (table.field_index(lat_f), table.field_index(lon_f)) else {
        return;
    };

    let col = table.push_field(fields::DIST_FROM_REF.to_string());
    for record in table.records_mut().iter_mut() {
        let lat = record.get(lat_c).and_then(FieldValue::as_f64);
        let lon = record.get(lon_c).and_then(FieldValue::as_f64);
        record.values[col] = match (lat, lon) {
            (Some(lat), Some(lon)) => haversine(origin, GeoPoint::new(lat, lon)).map(FieldValue::Number),
            _ => None,
        };
    }
    info!(source = %id, lat = origin.lat, lon = origin.lon, "Derived distance from reference point");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{LoadStats, StreamRecord};
    use crate::timestamp::MICROS_PER_SEC;
    use proptest::prelude::*;

    fn stream(id: StreamId, fields: &[&str], rows: Vec<(i64, Vec<Option<f64>>)>) -> StreamTable {
        StreamTable {
            stream: id,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            records: rows
                .into_iter()
                .map(|(t, vals)| StreamRecord {
                    timestamp: Timestamp(t),
                    values: vals.into_iter().map(|v| v.map(FieldValue::Number)).collect(),
                })
                .collect(),
            stats: LoadStats::default(),
        }
    }

    fn att(n: i64) -> StreamTable {
        stream(
            StreamId::Att,
            &["Roll", "DesRoll", "Pitch", "DesPitch", "Yaw", "DesYaw"],
            (0..n).map(|i| (i * MICROS_PER_SEC, vec![Some(i as f64); 6])).collect(),
        )
    }

    fn imu(n: i64) -> StreamTable {
        stream(
            StreamId::Imu,
            &["GyrX", "GyrY", "GyrZ"],
            (0..n)
                .map(|i| (i * MICROS_PER_SEC + 10_000, vec![Some(0.1); 3]))
                .collect(),
        )
    }

    #[test]
    fn test_scenario_required_only() {
        let table = align(&[att(100), imu(100)], &[], &AlignConfig::default()).unwrap();
        assert_eq!(table.len(), 100);
        assert_eq!(table.streams(), &[StreamId::Att, StreamId::Imu]);
        assert!(!table.has_field(fields::DIST_FROM_REF));
        assert!(!table.has_field(fields::RCIN_ROLL));
        assert!((0..100).all(|i| table.number(i, "GyrZ") == Some(0.1)));
    }

    #[test]
    fn test_scenario_position_for_first_half() {
        let pos = stream(
            StreamId::Pos,
            &[fields::POS_LAT, fields::POS_LNG],
            (0..50)
                .map(|i| (i * MICROS_PER_SEC, vec![Some(47.0 + i as f64 * 1e-4), Some(8.0)]))
                .collect(),
        );
        let table = align(&[att(100), imu(100)], &[pos], &AlignConfig::default()).unwrap();
        assert_eq!(table.len(), 100);
        for row in 0..100 {
            let dist = table.number(row, fields::DIST_FROM_REF);
            if row < 50 {
                assert!(dist.is_some(), "row {} should carry a distance", row);
            } else {
                assert!(dist.is_none(), "row {} should be null", row);
            }
        }
        assert_eq!(table.number(0, fields::DIST_FROM_REF), Some(0.0));
    }

    #[test]
    fn test_missing_required_stream() {
        let err = align(&[att(10)], &[], &AlignConfig::default()).unwrap_err();
        assert!(matches!(err, ReelError::Alignment { ref stream } if stream == "IMU"));
        let err = align(&[], &[], &AlignConfig::default()).unwrap_err();
        assert!(matches!(err, ReelError::Alignment { ref stream } if stream == "ATT"));
    }

    #[test]
    fn test_duplicate_reference_rows_are_counted() {
        let mut reference = att(6);
        reference.records[3].timestamp = reference.records[2].timestamp;
        reference.records[3].values[0] = Some(FieldValue::Number(99.0));
        let table = align(&[reference, imu(6)], &[], &AlignConfig::default()).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.collapsed_reference_rows(), 1);
        assert_eq!(table.number(2, "Roll"), Some(99.0));
    }

    #[test]
    fn test_huge_tolerance_saturates() {
        let cfg = AlignConfig::default().with_tolerance_ms(i64::MAX / 10);
        assert_eq!(cfg.tolerance_micros, i64::MAX);
        assert!(cfg.validate().is_ok());
        let table = align(&[att(5), imu(5)], &[], &cfg).unwrap();
        assert!((0..5).all(|i| table.number(i, "GyrX") == Some(0.1)));
        assert!(AlignConfig::default().with_tolerance_ms(i64::MIN).validate().is_err());
    }

    #[test]
    fn test_ties_and_duplicates() {
        let r = [Timestamp(100)];
        // 90 and 110 are equally far: earlier wins.
        assert_eq!(nearest_indices(&r, &[Timestamp(90), Timestamp(110)], 50), vec![Some(0)]);
        // Duplicate timestamps: last wins.
        assert_eq!(
            nearest_indices(&r, &[Timestamp(100), Timestamp(100), Timestamp(300)], 50),
            vec![Some(1)]
        );
        assert_eq!(nearest_indices(&r, &[], 50), vec![None]);
    }

    #[test]
    fn test_collision_is_prefixed() {
        let extra = stream(StreamId::Baro, &["Roll"], (0..10).map(|i| (i * MICROS_PER_SEC, vec![Some(-1.0)])).collect());
        let table = align(&[att(10), imu(10)], &[extra], &AlignConfig::default()).unwrap();
        assert_eq!(table.number(3, "Roll"), Some(3.0));
        assert_eq!(table.number(3, "BARO_Roll"), Some(-1.0));
    }

    proptest! {
        #[test]
        fn prop_tolerance_law(
            mut reference in prop::collection::vec(0i64..1_000_000, 1..60),
            mut other in prop::collection::vec(0i64..1_000_000, 0..60),
            tolerance in 0i64..50_000,
        ) {
            reference.sort_unstable();
            reference.dedup();
            other.sort_unstable();
            let r: Vec<Timestamp> = reference.iter().map(|&t| Timestamp(t)).collect();
            let o: Vec<Timestamp> = other.iter().map(|&t| Timestamp(t)).collect();
            let got = nearest_indices(&r, &o, tolerance);
            prop_assert_eq!(got.len(), r.len());
            for (i, ts) in r.iter().enumerate() {
                let best = o.iter().map(|x| x.abs_diff_micros(*ts)).min();
                match (got[i], best) {
                    (Some(k), Some(d)) => {
                        prop_assert_eq!(o[k].abs_diff_micros(*ts), d);
                        prop_assert!(d <= tolerance as u64);
                    }
                    (None, Some(d)) => prop_assert!(d > tolerance as u64),
                    (None, None) => {}
                    (Some(_), None) => prop_assert!(false, "match against empty stream"),
                }
            }
        }
    }
}
