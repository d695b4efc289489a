//! Editing layer over a validated document
//!
//! Paid-out rows are final: once the latest report marks a row `ausgezahlt`,
//! no cell of that row may change.

use thiserror::Error;

use crate::models::annotation::{CellAnnotation, CellStatus, STATUS_FIELD};
use crate::models::document::{DocumentError, TabularDocument};
use crate::models::report::ReconciliationReport;

/// Why an edit was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditRejected {
    #[error("Row {0} is paid out and can no longer be edited")]
    FinalizedRow(usize),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Document plus the report that governs which rows are editable
#[derive(Debug, Clone)]
pub struct DocumentEditor {
    document: TabularDocument,
    report: Option<ReconciliationReport>,
}

impl DocumentEditor {
    pub fn new(document: TabularDocument, report: Option<ReconciliationReport>) -> Self {
        Self { document, report }
    }

    pub fn document(&self) -> &TabularDocument {
        &self.document
    }

    pub fn into_document(self) -> TabularDocument {
        self.document
    }

    pub fn report(&self) -> Option<&ReconciliationReport> {
        self.report.as_ref()
    }

    /// Swap in a newer report
    pub fn set_report(&mut self, report: ReconciliationReport) {
        self.report = Some(report);
    }

    pub fn is_row_locked(&self, row_index: usize) -> bool {
        self.report
            .as_ref()
            .and_then(|report| report.row(row_index))
            .is_some_and(|row| row.is_locked())
    }

    /// Overwrite one cell of a data row
    pub fn set_cell(&mut self, row_index: usize, field: &str, value: impl Into<String>) -> Result<(), EditRejected> {
        if row_index == 0 {
            return Err(DocumentError::HeaderRow.into());
        }
        if self.is_row_locked(row_index) {
            tracing::debug!(row_index, field, "Refusing edit of paid-out row");
            return Err(EditRejected::FinalizedRow(row_index));
        }
        let column = self
            .document
            .field_index(field)
            .ok_or_else(|| EditRejected::UnknownField(field.to_string()))?;

        self.document.set_value(row_index, column, value)?;
        Ok(())
    }

    /// Append a header field; existing indices are unchanged
    pub fn add_column(&mut self, name: &str) -> usize {
        match self.document.field_index(name) {
            Some(column) => column,
            None => self.document.add_column(name),
        }
    }

    /// Write the report's confirmed values into the document
    ///
    /// Only `ok` cells of matched rows are written; the status column is
    /// appended when the header lacks one. Returns the number of cells
    /// changed.
    pub fn apply_report_values(&mut self) -> usize {
        let Some(report) = self.report.clone() else {
            return 0;
        };

        let mut changed = 0;
        for (slot, annotation) in report.rows.iter().enumerate() {
            let Some(annotation) = annotation else { continue };
            if !annotation.is_matched() {
                continue;
            }
            let row_index = slot + 1;

            for (field, cell) in &annotation.cells {
                let CellAnnotation::Present {
                    value,
                    status: CellStatus::Ok,
                    ..
                } = cell
                else {
                    continue;
                };

                let column = match self.document.field_index(field) {
                    Some(column) => column,
                    None if field == STATUS_FIELD => self.document.add_column(STATUS_FIELD),
                    None => continue,
                };
                if self.document.value(row_index, column) == Some(value.as_str()) {
                    continue;
                }
                if self.document.set_value(row_index, column, value.clone()).is_ok() {
                    changed += 1;
                }
            }
        }

        changed
    }
}
