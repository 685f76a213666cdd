//! Quick column overview of a telemetry CSV.

use crate::error::ReelResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Longest example value shown per column.
const EXAMPLE_WIDTH: usize = 50;

/// Inferred kind of a column, from its non-empty cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Empty,
}

impl ColumnKind {
    fn of(cell: &str) -> ColumnKind {
        if cell.parse::<i64>().is_ok() {
            ColumnKind::Integer
        } else if cell.parse::<f64>().is_ok() {
            ColumnKind::Float
        } else {
            ColumnKind::Text
        }
    }

    /// Widens `self` to also cover `other`.
    fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (Text, _) | (_, Text) => Text,
            (Float, _) | (_, Float) => Float,
            (Integer, Integer) => Integer,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

impl fmt::Display for CsvSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} rows)", self.path.display(), self.rows)?;
        for col in &self.columns {
            writeln!(
                f,
                "  {:<24} {:<8} {}",
                col.name,
                col.kind.to_string(),
                col.example.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= EXAMPLE_WIDTH {
        s.to_string()
    } else {
        let head: String = s.chars().take(EXAMPLE_WIDTH - 3).collect();
        format!("{}...", head)
    }
}

/// Scans a CSV and summarizes its columns.
pub fn inspect_csv(path: &Path) -> ReelResult<CsvSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut kinds = vec![ColumnKind::Empty; headers.len()];
    let mut examples: Vec<Option<String>> = vec![None; headers.len()];
    let mut rows = 0;

    for record in reader.records() {
        let record = record?;
        rows += 1;
        for (i, cell) in record.iter().enumerate().take(headers.len()) {
            if cell.is_empty() {
                continue;
            }
            kinds[i] = kinds[i].merge(ColumnKind::of(cell));
            if examples[i].is_none() {
                examples[i] = Some(truncate(cell));
            }
        }
    }

    let columns = headers
        .iter()
        .zip(kinds.into_iter().zip(examples))
        .map(|(name, (kind, example))| ColumnSummary {
            name: name.to_string(),
            kind,
            example,
        })
        .collect();

    Ok(CsvSummary {
        path: path.to_path_buf(),
        rows,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_kinds_and_examples() {
        let file = NamedTempFile::new().unwrap();
        let long = "x".repeat(80);
        std::fs::write(
            file.path(),
            format!("timestamp,Count,Volt,Note,Blank\n1,2,3,,\n2,5,3.5,{},\n", long),
        )
        .unwrap();

        let summary = inspect_csv(file.path()).unwrap();
        assert_eq!(summary.rows, 2);
        let kinds: Vec<ColumnKind> = summary.columns.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Integer,
                ColumnKind::Integer,
                ColumnKind::Float,
                ColumnKind::Text,
                ColumnKind::Empty
            ]
        );
        let note = summary.columns[3].example.as_ref().unwrap();
        assert_eq!(note.chars().count(), 50);
        assert!(note.ends_with("..."));
        assert!(summary.columns[4].example.is_none());
        assert!(summary.to_string().contains("Volt"));
    }
}
