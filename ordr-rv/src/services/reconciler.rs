//! Whole-document reconciliation
//!
//! Applies the row matcher to every data row and assembles the per-row
//! annotations plus diagnostics. Malformed rows keep an empty slot so the
//! result stays aligned with the document. Rows already paid out in the
//! previous report are taken over as they were instead of being re-matched.

use crate::models::annotation::RowAnnotation;
use crate::models::document::TabularDocument;
use crate::models::remote::RemoteOrderIndex;
use crate::models::report::{ReconciliationReport, ReportDiagnostics};

use super::row_matcher::{missing_required_fields, RowMatcher};

/// Match every data row of `document` against `index`
pub fn reconcile_document(
    document: &TabularDocument,
    index: &RemoteOrderIndex,
    prior: Option<&ReconciliationReport>,
) -> (Vec<Option<RowAnnotation>>, ReportDiagnostics) {
    let matcher = RowMatcher::new(document.header());
    let mut diagnostics = ReportDiagnostics {
        orders_count: index.len(),
        missing_required_fields: missing_required_fields(document.header()),
        ..ReportDiagnostics::default()
    };

    if !diagnostics.missing_required_fields.is_empty() {
        tracing::debug!(
            missing = ?diagnostics.missing_required_fields,
            "Document header lacks required fields"
        );
    }

    let mut rows = Vec::with_capacity(document.data_row_count());
    for (slot, row) in document.data_rows().enumerate() {
        let row_index = slot + 1;
        let Some(row) = row else {
            tracing::debug!(row_index, "Skipping malformed row");
            diagnostics.skipped_rows += 1;
            rows.push(None);
            continue;
        };

        if let Some(carried) = carried_forward(prior, row_index, matcher.token_of(row)) {
            diagnostics.carried_rows += 1;
            diagnostics.matched_rows += 1;
            rows.push(Some(carried));
            continue;
        }

        let annotation = matcher.match_row(row, index);
        if annotation.is_matched() {
            diagnostics.matched_rows += 1;
        } else if annotation.is_degraded() {
            diagnostics.degraded_rows += 1;
        } else {
            diagnostics.unmatched_rows += 1;
        }
        rows.push(Some(annotation));
    }

    if diagnostics.degraded_rows > 0 {
        tracing::warn!(
            degraded_rows = diagnostics.degraded_rows,
            "Rows could not be matched for structural reasons"
        );
    }

    (rows, diagnostics)
}

/// Prior annotation of a finalized row whose token is unchanged
fn carried_forward(
    prior: Option<&ReconciliationReport>,
    row_index: usize,
    token: Option<&str>,
) -> Option<RowAnnotation> {
    let previous = prior?.row(row_index)?;
    if !previous.is_locked() || previous.order_token.as_deref() != Some(token?) {
        return None;
    }
    let mut annotation = previous.clone();
    annotation.carried_forward = true;
    Some(annotation)
}
