//! Cell and row annotations produced by the row matcher
//!
//! The status vocabularies here are load-bearing: UI colorization and the
//! paid-out edit freeze key off the exact serialized symbols.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::document::normalize_name;

/// Field carrying the reconciliation status of a row
pub const STATUS_FIELD: &str = "Status in der uppr Performance Platform";

/// Remark shown to the advertiser for rows already known to the network
pub const REMARK_ADVERTISER_MATCHED: &str = "Bereits im Netzwerk";

/// Remark shown to the publisher for rows already known to the network
pub const REMARK_PUBLISHER_MATCHED: &str = "weitere Bearbeitung folgt nach Feedback vom Advertiser";

/// Per-cell match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Ok,
    Invalid,
    Empty,
}

/// Per-cell annotation
///
/// `Absent` is decided at construction time; consumers never inspect shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CellAnnotation {
    Present {
        value: String,
        status: CellStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Absent,
}

impl CellAnnotation {
    pub fn present(value: impl Into<String>, status: CellStatus) -> Self {
        CellAnnotation::Present {
            value: value.into(),
            status,
            note: None,
        }
    }

    pub fn with_note(value: impl Into<String>, status: CellStatus, note: impl Into<String>) -> Self {
        CellAnnotation::Present {
            value: value.into(),
            status,
            note: Some(note.into()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            CellAnnotation::Present { value, .. } => Some(value),
            CellAnnotation::Absent => None,
        }
    }

    pub fn status(&self) -> Option<CellStatus> {
        match self {
            CellAnnotation::Present { status, .. } => Some(*status),
            CellAnnotation::Absent => None,
        }
    }
}

/// Reconciliation status of a row, in the platform's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    #[serde(rename = "offen")]
    Offen,
    #[serde(rename = "bestätigt")]
    Bestaetigt,
    #[serde(rename = "storniert")]
    Storniert,
    #[serde(rename = "ausgezahlt")]
    Ausgezahlt,
}

impl ReconciliationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconciliationStatus::Offen => "offen",
            ReconciliationStatus::Bestaetigt => "bestätigt",
            ReconciliationStatus::Storniert => "storniert",
            ReconciliationStatus::Ausgezahlt => "ausgezahlt",
        }
    }

    /// Paid-out rows are final and frozen for editing
    pub fn is_final(self) -> bool {
        self == ReconciliationStatus::Ausgezahlt
    }
}

impl std::fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a row could not be matched at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradedReason {
    /// Document has no usable header
    NoHeader,
    /// No header column resolves to an order token
    NoTokenColumn,
}

/// Aggregate outcome of matching one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RowOutcome {
    /// Remote record found with a recognized payment status
    Matched { status: ReconciliationStatus },
    /// Remote record found but its payment status is not recognized
    UnrecognizedStatus { raw: String },
    /// Token not present in the remote index
    NoMatch { token: String },
    /// Token cell is blank
    MissingToken,
    /// Row could not be matched for structural reasons
    Degraded { reason: DegradedReason },
}

/// Per-row bundle of cell annotations plus the derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAnnotation {
    /// Field name → cell annotation
    pub cells: BTreeMap<String, CellAnnotation>,
    pub outcome: RowOutcome,
    /// Token used for the lookup, if one was read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark_advertiser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark_publisher: Option<String>,
    /// Annotation was taken over from a previous report (finalized row)
    #[serde(default)]
    pub carried_forward: bool,
}

impl RowAnnotation {
    /// Reconciliation status, only for matched rows
    pub fn status(&self) -> Option<ReconciliationStatus> {
        match self.outcome {
            RowOutcome::Matched { status } => Some(status),
            _ => None,
        }
    }

    /// Whether consumers must refuse edits to this row
    pub fn is_locked(&self) -> bool {
        self.status().is_some_and(ReconciliationStatus::is_final)
    }

    pub fn is_matched(&self) -> bool {
        matches!(
            self.outcome,
            RowOutcome::Matched { .. } | RowOutcome::UnrecognizedStatus { .. }
        )
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, RowOutcome::Degraded { .. })
    }

    /// Cell by field name; exact key first, then case-insensitive
    pub fn cell(&self, field: &str) -> Option<&CellAnnotation> {
        if let Some(cell) = self.cells.get(field) {
            return Some(cell);
        }
        let wanted = normalize_name(field);
        self.cells
            .iter()
            .find(|(name, _)| normalize_name(name) == wanted)
            .map(|(_, cell)| cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_symbols() {
        assert_eq!(
            serde_json::to_value(ReconciliationStatus::Bestaetigt).unwrap(),
            json!("bestätigt")
        );
        assert_eq!(
            serde_json::to_value(ReconciliationStatus::Ausgezahlt).unwrap(),
            json!("ausgezahlt")
        );
        assert_eq!(serde_json::to_value(CellStatus::Invalid).unwrap(), json!("invalid"));
    }

    #[test]
    fn test_cell_annotation_shape() {
        let present = CellAnnotation::present("T1", CellStatus::Ok);
        assert_eq!(
            serde_json::to_value(&present).unwrap(),
            json!({"kind": "present", "value": "T1", "status": "ok"})
        );
        assert_eq!(
            serde_json::to_value(CellAnnotation::Absent).unwrap(),
            json!({"kind": "absent"})
        );
        assert_eq!(CellAnnotation::Absent.value(), None);
        assert_eq!(present.status(), Some(CellStatus::Ok));
    }

    #[test]
    fn test_locked_only_when_paid_out() {
        let mut row = RowAnnotation {
            cells: BTreeMap::new(),
            outcome: RowOutcome::Matched {
                status: ReconciliationStatus::Ausgezahlt,
            },
            order_token: Some("T1".to_string()),
            remark_advertiser: None,
            remark_publisher: None,
            carried_forward: false,
        };
        assert!(row.is_locked());

        row.outcome = RowOutcome::Matched {
            status: ReconciliationStatus::Storniert,
        };
        assert!(!row.is_locked());

        row.outcome = RowOutcome::NoMatch {
            token: "T1".to_string(),
        };
        assert!(!row.is_locked());
        assert_eq!(row.status(), None);
    }

    #[test]
    fn test_cell_lookup_case_insensitive() {
        let mut cells = BTreeMap::new();
        cells.insert("SubID".to_string(), CellAnnotation::present("S1", CellStatus::Ok));
        let row = RowAnnotation {
            cells,
            outcome: RowOutcome::MissingToken,
            order_token: None,
            remark_advertiser: None,
            remark_publisher: None,
            carried_forward: false,
        };

        assert_eq!(row.cell("subid").and_then(CellAnnotation::value), Some("S1"));
        assert!(row.cell("Timestamp").is_none());
    }
}
