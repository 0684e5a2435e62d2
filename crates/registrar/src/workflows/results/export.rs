//! Class results export (`v1` layout).
//!
//! Columns, in order: `School ID`, `Name`, one column per subject in
//! alphabetical order (empty when the student has no record), `Average`,
//! `Rank`, `Remark`. Averages always carry two decimals.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::Serialize;

use super::ranking::RankingSnapshot;
use super::transcript::format_score;
use crate::workflows::enrollment::SchoolId;

pub const EXPORT_FORMAT_VERSION: &str = "v1";

const LEADING_COLUMNS: [&str; 2] = ["School ID", "Name"];
const TRAILING_COLUMNS: [&str; 3] = ["Average", "Rank", "Remark"];

/// Header row for a snapshot with the given subjects.
pub fn export_header(subjects: &[String]) -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .chain(subjects.iter().cloned())
        .chain(TRAILING_COLUMNS.iter().map(|column| column.to_string()))
        .collect()
}

pub fn write_snapshot<W: Write>(snapshot: &RankingSnapshot, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(export_header(&snapshot.subjects))?;

    for entry in &snapshot.entries {
        let mut row = Vec::with_capacity(snapshot.subjects.len() + 5);
        row.push(entry.school_id.to_string());
        row.push(entry.student_name.clone());
        for subject in &snapshot.subjects {
            row.push(
                entry
                    .scores
                    .get(subject)
                    .map(|score| format_score(*score))
                    .unwrap_or_default(),
            );
        }
        row.push(format!("{:.2}", entry.average));
        row.push(entry.rank.to_string());
        row.push(entry.remark.clone());
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// One parsed row of a `v1` export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedRow {
    pub school_id: SchoolId,
    pub name: String,
    pub scores: BTreeMap<String, Option<f64>>,
    pub average: f64,
    pub rank: u32,
    pub remark: String,
}

/// Parse a `v1` export back into rows.
pub fn read_export<R: Read>(reader: R) -> Result<Vec<ExportedRow>, ExportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let width = headers.len();
    if width < LEADING_COLUMNS.len() + TRAILING_COLUMNS.len()
        || headers.iter().take(2).ne(LEADING_COLUMNS.iter().copied())
        || headers
            .iter()
            .skip(width - TRAILING_COLUMNS.len())
            .ne(TRAILING_COLUMNS.iter().copied())
    {
        return Err(ExportError::Header(format!(
            "expected {EXPORT_FORMAT_VERSION} columns, found '{}'",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let subjects: Vec<&str> = headers
        .iter()
        .skip(LEADING_COLUMNS.len())
        .take(width - LEADING_COLUMNS.len() - TRAILING_COLUMNS.len())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = index + 2;
        let cell = |position: usize| record.get(position).unwrap_or_default();

        let mut scores = BTreeMap::new();
        for (offset, subject) in subjects.iter().enumerate() {
            let raw = cell(LEADING_COLUMNS.len() + offset);
            let score = if raw.is_empty() {
                None
            } else {
                Some(parse_cell(raw, line, subject)?)
            };
            scores.insert(subject.to_string(), score);
        }

        let average = parse_cell::<f64>(cell(width - 3), line, "Average")?;
        let rank = parse_cell::<u32>(cell(width - 2), line, "Rank")?;

        rows.push(ExportedRow {
            school_id: SchoolId(cell(0).to_string()),
            name: cell(1).to_string(),
            scores,
            average,
            rank,
            remark: cell(width - 1).to_string(),
        });
    }

    Ok(rows)
}

fn parse_cell<T: std::str::FromStr>(raw: &str, line: usize, column: &str) -> Result<T, ExportError> {
    raw.parse().map_err(|_| ExportError::Value {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid export CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised export header: {0}")]
    Header(String),
    #[error("line {line}: invalid {column} value '{value}'")]
    Value {
        line: usize,
        column: String,
        value: String,
    },
}
