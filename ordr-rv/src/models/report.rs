//! Reconciliation report: the aggregate result of one validation run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::annotation::{CellStatus, ReconciliationStatus, RowAnnotation};
use super::document::DocumentId;

/// Counters describing how a run went, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDiagnostics {
    /// Remote orders in the index used for this run
    pub orders_count: usize,
    pub matched_rows: usize,
    /// No-match and missing-token rows
    pub unmatched_rows: usize,
    /// Rows without a usable header or token column
    pub degraded_rows: usize,
    /// Malformed rows, excluded from matching
    pub skipped_rows: usize,
    /// Finalized rows taken over from the previous report
    pub carried_rows: usize,
    /// Required publisher fields missing from the header
    pub missing_required_fields: Vec<String>,
}

/// Result of a successful validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub document_id: DocumentId,
    /// Aligned 1:1 with the document's data rows; `None` for malformed rows
    pub rows: Vec<Option<RowAnnotation>>,
    pub produced_at: DateTime<Utc>,
    /// Strictly increasing across reports produced by this process
    pub freshness: u64,
    pub diagnostics: ReportDiagnostics,
}

impl ReconciliationReport {
    pub fn new(
        document_id: DocumentId,
        rows: Vec<Option<RowAnnotation>>,
        diagnostics: ReportDiagnostics,
    ) -> Self {
        Self {
            document_id,
            rows,
            produced_at: Utc::now(),
            freshness: next_freshness(),
            diagnostics,
        }
    }

    /// Annotation for a document row index (header = 0, first data row = 1)
    pub fn row(&self, row_index: usize) -> Option<&RowAnnotation> {
        let slot = row_index.checked_sub(1)?;
        self.rows.get(slot)?.as_ref()
    }

    /// Whether a later report should replace `other`
    pub fn supersedes(&self, other: &ReconciliationReport) -> bool {
        self.freshness >= other.freshness
    }
}

static LAST_FRESHNESS: AtomicU64 = AtomicU64::new(0);

/// Next freshness marker
///
/// Based on the wall clock in microseconds so markers stay ordered across
/// restarts, and bumped past the previous value so they never repeat.
pub fn next_freshness() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
    let previous = LAST_FRESHNESS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(now.max(prev + 1))
        })
        .unwrap_or_else(|prev| prev);
    now.max(previous + 1)
}

/// Reconciliation status of a document row, `None` when unmatched or absent
pub fn get_row_status(report: &ReconciliationReport, row_index: usize) -> Option<ReconciliationStatus> {
    report.row(row_index)?.status()
}

/// Annotated value of a cell, `None` when the cell is absent
pub fn get_cell_value<'a>(
    report: &'a ReconciliationReport,
    row_index: usize,
    field: &str,
) -> Option<&'a str> {
    report.row(row_index)?.cell(field)?.value()
}

/// Match status of a cell, `None` when the cell is absent
pub fn get_cell_status(report: &ReconciliationReport, row_index: usize, field: &str) -> Option<CellStatus> {
    report.row(row_index)?.cell(field)?.status()
}
