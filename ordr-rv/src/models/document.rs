//! Uploaded order file as an in-memory grid
//!
//! Row 0 is the header naming the fields; rows 1..N are data rows. Upstream
//! parsing may yield sparse or malformed rows, so a data row can be absent.
//! Absent rows are skipped by the engine, never treated as errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Identifier of an uploaded document (the upload id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document access errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document content is not a grid (expected array of rows)")]
    NotAGrid,

    #[error("Row {0} does not exist")]
    RowOutOfRange(usize),

    #[error("Row {0} is malformed")]
    MalformedRow(usize),

    #[error("Column {0} does not exist")]
    ColumnOutOfRange(usize),

    #[error("The header row cannot be edited as data")]
    HeaderRow,
}

/// Tabular document: header plus data rows of strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularDocument {
    header: Vec<String>,
    /// Data rows; `None` marks a malformed row
    rows: Vec<Option<Vec<String>>>,
    /// Lowercased, trimmed field name → column (later duplicate wins)
    field_columns: HashMap<String, usize>,
}

impl TabularDocument {
    /// Build from a raw grid whose first entry is the header
    pub fn from_grid(grid: Vec<Option<Vec<String>>>) -> Self {
        let mut iter = grid.into_iter();
        let header = iter.next().flatten().unwrap_or_default();
        Self::with_header(header, iter.collect())
    }

    /// Build from a grid with a plausible header row somewhere near the top
    ///
    /// Files often carry title rows above the header. The header is the row
    /// with the most cells matching `expected` (first such row on ties); rows
    /// above it are dropped. Without any hit, row 0 is the header.
    pub fn from_grid_detect_header(grid: Vec<Option<Vec<String>>>, expected: &[&str]) -> Self {
        let expected: Vec<String> = expected.iter().map(|e| normalize_name(e)).collect();

        let mut best_idx = 0;
        let mut best_hits = 0;
        for (i, row) in grid.iter().enumerate() {
            let Some(row) = row else { continue };
            let hits = row
                .iter()
                .filter(|cell| expected.contains(&normalize_name(cell)))
                .count();
            if hits > best_hits {
                best_hits = hits;
                best_idx = i;
            }
        }

        Self::from_grid(grid.into_iter().skip(best_idx).collect())
    }

    /// Build from a JSON array of rows
    ///
    /// Entries that are not arrays (null, objects, scalars) become malformed
    /// rows. Scalar cells are stringified and null cells become empty.
    pub fn from_json(value: &Value) -> Result<Self, DocumentError> {
        Ok(Self::from_grid(grid_from_json(value)?))
    }

    fn with_header(header: Vec<String>, rows: Vec<Option<Vec<String>>>) -> Self {
        let mut document = Self {
            header,
            rows,
            field_columns: HashMap::new(),
        };
        document.rebuild_field_columns();
        document
    }

    fn rebuild_field_columns(&mut self) {
        self.field_columns.clear();
        for (column, name) in self.header.iter().enumerate() {
            let key = normalize_name(name);
            if !key.is_empty() {
                self.field_columns.insert(key, column);
            }
        }
    }

    /// Header row (field names)
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of data rows, malformed ones included
    pub fn data_row_count(&self) -> usize {
        self.rows.len()
    }

    /// Data row by document row index (1-based; 0 is the header)
    pub fn row(&self, row_index: usize) -> Option<&[String]> {
        if row_index == 0 {
            return Some(&self.header);
        }
        self.rows.get(row_index - 1)?.as_deref()
    }

    /// Data rows in order, `None` for malformed rows
    pub fn data_rows(&self) -> impl Iterator<Item = Option<&[String]>> + '_ {
        self.rows.iter().map(|row| row.as_deref())
    }

    /// Column of a field, case-insensitive; the later column wins on duplicates
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_columns.get(&normalize_name(name)).copied()
    }

    /// Cell value
    ///
    /// Short rows read as empty within the header width. Malformed rows and
    /// columns beyond the header yield `None`.
    pub fn value(&self, row_index: usize, column: usize) -> Option<&str> {
        if column >= self.header.len() {
            return None;
        }
        let row = self.row(row_index)?;
        Some(row.get(column).map(String::as_str).unwrap_or(""))
    }

    /// Append a header field; existing column indices never shift
    pub fn add_column(&mut self, name: &str) -> usize {
        self.header.push(name.to_string());
        self.rebuild_field_columns();
        self.header.len() - 1
    }

    /// Overwrite one data cell, padding short rows
    pub fn set_value(
        &mut self,
        row_index: usize,
        column: usize,
        value: impl Into<String>,
    ) -> Result<(), DocumentError> {
        if row_index == 0 {
            return Err(DocumentError::HeaderRow);
        }
        if column >= self.header.len() {
            return Err(DocumentError::ColumnOutOfRange(column));
        }
        let slot = self
            .rows
            .get_mut(row_index - 1)
            .ok_or(DocumentError::RowOutOfRange(row_index))?;
        let row = slot.as_mut().ok_or(DocumentError::MalformedRow(row_index))?;
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = value.into();
        Ok(())
    }

    /// Grid form (header first), e.g. for writing the file back
    pub fn to_grid(&self) -> Vec<Option<Vec<String>>> {
        std::iter::once(Some(self.header.clone()))
            .chain(self.rows.iter().cloned())
            .collect()
    }
}

/// Raw grid of a JSON array of rows; non-array entries become `None`
pub fn grid_from_json(value: &Value) -> Result<Vec<Option<Vec<String>>>, DocumentError> {
    let entries = value.as_array().ok_or(DocumentError::NotAGrid)?;
    Ok(entries
        .iter()
        .map(|entry| {
            entry
                .as_array()
                .map(|cells| cells.iter().map(cell_to_string).collect())
        })
        .collect())
}

/// Field names compare trimmed and case-insensitive
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
