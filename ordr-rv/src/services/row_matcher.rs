//! Row matching against the remote order index
//!
//! **Algorithm:**
//! 1. Resolve the order-token column once per header (later column wins)
//! 2. Read the token from the row; blank → `MissingToken`
//! 3. Look the token up; absent → `NoMatch`, local values kept untouched
//! 4. Found → header fields known remotely take the remote value (`ok`),
//!    the rest keep the local value (`empty`)
//! 5. Map the remote payment status into the status cell; unknown → `invalid`
//!
//! Timestamp and SubID cells are also checked for content on every row
//! (see `cell_checks`).
//!
//! Matching is pure: the same row, header and index always yield the same
//! annotation. Structural problems degrade a single row and never abort the
//! batch.

use std::collections::{BTreeMap, HashMap};

use super::cell_checks::{matched_timestamp_cell, sub_id_cell, timestamp_cell, CheckedField};
use crate::models::annotation::{
    CellAnnotation, CellStatus, DegradedReason, RowAnnotation, RowOutcome,
    REMARK_ADVERTISER_MATCHED, REMARK_PUBLISHER_MATCHED, STATUS_FIELD,
};
use crate::models::document::normalize_name;
use crate::models::remote::{field_key, RemoteOrderIndex, RemoteOrderRecord};

/// Authoritative header of the order-token column
pub const PRIMARY_TOKEN_FIELD: &str = "Ordertoken/OrderID";

/// Known alternate spellings, tried in order when the primary is absent
pub const ALTERNATE_TOKEN_FIELDS: &[&str] = &[
    "Ordertoken/Order ID",
    "Ordertoken / OrderID",
    "Ordertoken / Order ID",
    "OrderToken",
    "OrderID",
    "Order ID",
];

/// Publisher fields every upload is expected to carry
pub const REQUIRED_FIELDS: &[&str] = &[
    "Publisher ID",
    "Vollständiger Name des Endkunden",
    "Adresse des Endkunden",
    "E-Mailadresse des Endkunden",
    "Grund der Anfrage",
    "Timestamp",
    "SubID",
    "Ordertoken/OrderID",
];

const NOTE_UNKNOWN_STATUS: &str = "Unbekannter Status im Netzwerk";
const NOTE_NOT_IN_NETWORK: &str = "Ordertoken nicht im Netzwerk gefunden";

/// One distinct header field and the column it reads from
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldColumn {
    /// Display name (as written in the winning column)
    name: String,
    column: usize,
}

/// Matcher bound to one header
#[derive(Debug, Clone)]
pub struct RowMatcher {
    fields: Vec<FieldColumn>,
    token_column: Option<usize>,
    status_column: Option<usize>,
}

impl RowMatcher {
    pub fn new(header: &[String]) -> Self {
        let mut fields: Vec<FieldColumn> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (column, raw) in header.iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            let field = FieldColumn {
                name: name.to_string(),
                column,
            };
            match positions.get(&normalize_name(name)) {
                Some(&pos) => fields[pos] = field,
                None => {
                    positions.insert(normalize_name(name), fields.len());
                    fields.push(field);
                }
            }
        }

        Self {
            fields,
            token_column: resolve_token_column(header),
            status_column: last_column_named(header, STATUS_FIELD),
        }
    }

    /// Column the order token is read from
    pub fn token_column(&self) -> Option<usize> {
        self.token_column
    }

    /// Trimmed, non-blank order token of a row
    pub fn token_of<'r>(&self, row: &'r [String]) -> Option<&'r str> {
        let column = self.token_column?;
        row.get(column)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Match one data row against the index
    pub fn match_row(&self, row: &[String], index: &RemoteOrderIndex) -> RowAnnotation {
        if self.fields.is_empty() {
            tracing::debug!(cells = row.len(), "Row degraded: document has no header");
            return self.local_annotation(
                row,
                index,
                RowOutcome::Degraded {
                    reason: DegradedReason::NoHeader,
                },
                None,
            );
        }

        let Some(token_column) = self.token_column else {
            tracing::debug!(cells = row.len(), "Row degraded: no order-token column in header");
            return self.local_annotation(
                row,
                index,
                RowOutcome::Degraded {
                    reason: DegradedReason::NoTokenColumn,
                },
                None,
            );
        };

        let Some(token) = self.token_of(row) else {
            tracing::debug!(token_column, "Row has a blank order token");
            let mut annotation = self.local_annotation(row, index, RowOutcome::MissingToken, None);
            if let Some(name) = self.name_of(token_column) {
                annotation
                    .cells
                    .insert(name, CellAnnotation::present(local_value(row, token_column), CellStatus::Empty));
            }
            return annotation;
        };

        match index.find(token) {
            Some(record) => self.matched_annotation(row, index, token_column, token, record),
            None => {
                tracing::debug!(token = %token, "Order token not in network index");
                let mut annotation = self.local_annotation(
                    row,
                    index,
                    RowOutcome::NoMatch {
                        token: token.to_string(),
                    },
                    Some(token),
                );
                if let Some(name) = self.name_of(token_column) {
                    annotation.cells.insert(
                        name,
                        CellAnnotation::with_note(
                            local_value(row, token_column),
                            CellStatus::Invalid,
                            NOTE_NOT_IN_NETWORK,
                        ),
                    );
                }
                annotation
            }
        }
    }

    /// Annotation that keeps every local value; the status cell is absent
    ///
    /// A SubID the network knows still earns the remarks.
    fn local_annotation(
        &self,
        row: &[String],
        index: &RemoteOrderIndex,
        outcome: RowOutcome,
        token: Option<&str>,
    ) -> RowAnnotation {
        let mut cells = BTreeMap::new();
        let mut known_sub_id = false;
        for field in &self.fields {
            if Some(field.column) == self.status_column {
                continue;
            }
            let value = local_value(row, field.column);
            let cell = match CheckedField::of(&field.name) {
                Some(CheckedField::Timestamp) => timestamp_cell(&value, CellStatus::Ok),
                Some(CheckedField::SubId) => {
                    let cell = sub_id_cell(&value, index);
                    known_sub_id |= cell.status() == Some(CellStatus::Ok);
                    cell
                }
                None if value.trim().is_empty() => CellAnnotation::present(value, CellStatus::Empty),
                None => CellAnnotation::present(value, CellStatus::Ok),
            };
            cells.insert(field.name.clone(), cell);
        }
        cells.insert(self.status_name(), CellAnnotation::Absent);

        let (remark_advertiser, remark_publisher) = if known_sub_id {
            (
                Some(REMARK_ADVERTISER_MATCHED.to_string()),
                Some(REMARK_PUBLISHER_MATCHED.to_string()),
            )
        } else {
            (None, None)
        };

        RowAnnotation {
            cells,
            outcome,
            order_token: token.map(str::to_string),
            remark_advertiser,
            remark_publisher,
            carried_forward: false,
        }
    }

    fn matched_annotation(
        &self,
        row: &[String],
        index: &RemoteOrderIndex,
        token_column: usize,
        token: &str,
        record: &RemoteOrderRecord,
    ) -> RowAnnotation {
        let mut cells = BTreeMap::new();
        for field in &self.fields {
            if field.column == token_column || Some(field.column) == self.status_column {
                continue;
            }
            let local = local_value(row, field.column);
            let remote = record.field(&field.name);
            let cell = match (CheckedField::of(&field.name), remote) {
                (Some(CheckedField::Timestamp), remote) => matched_timestamp_cell(&local, remote),
                (_, Some(remote)) => CellAnnotation::present(remote, CellStatus::Ok),
                (Some(CheckedField::SubId), None) => sub_id_cell(&local, index),
                (None, None) => CellAnnotation::present(local, CellStatus::Empty),
            };
            cells.insert(field.name.clone(), cell);
        }

        if let Some(name) = self.name_of(token_column) {
            cells.insert(name, CellAnnotation::present(local_value(row, token_column), CellStatus::Ok));
        }

        let (status_cell, outcome) = match record.payment_status.reconciliation_status() {
            Some(status) => (
                CellAnnotation::present(status.as_str(), CellStatus::Ok),
                RowOutcome::Matched { status },
            ),
            None => {
                let raw = record.payment_status.raw().to_string();
                tracing::warn!(
                    token = %token,
                    raw_status = %raw,
                    "Remote order has unrecognized payment status"
                );
                (
                    CellAnnotation::with_note(raw.clone(), CellStatus::Invalid, NOTE_UNKNOWN_STATUS),
                    RowOutcome::UnrecognizedStatus { raw },
                )
            }
        };
        cells.insert(self.status_name(), status_cell);

        RowAnnotation {
            cells,
            outcome,
            order_token: Some(token.to_string()),
            remark_advertiser: Some(REMARK_ADVERTISER_MATCHED.to_string()),
            remark_publisher: Some(REMARK_PUBLISHER_MATCHED.to_string()),
            carried_forward: false,
        }
    }

    fn name_of(&self, column: usize) -> Option<String> {
        self.fields
            .iter()
            .find(|field| field.column == column)
            .map(|field| field.name.clone())
    }

    /// Status cell key: the header's spelling when present
    fn status_name(&self) -> String {
        self.status_column
            .and_then(|column| self.name_of(column))
            .unwrap_or_else(|| STATUS_FIELD.to_string())
    }
}

/// Match one row against a header and index
pub fn match_row(row: &[String], header: &[String], index: &RemoteOrderIndex) -> RowAnnotation {
    RowMatcher::new(header).match_row(row, index)
}

/// Resolve the order-token column of a header
///
/// Primary name, then alternates, then any token-like column. At every step
/// the later column wins when several share a name.
pub fn resolve_token_column(header: &[String]) -> Option<usize> {
    std::iter::once(PRIMARY_TOKEN_FIELD)
        .chain(ALTERNATE_TOKEN_FIELDS.iter().copied())
        .find_map(|name| last_column_named(header, name))
        .or_else(|| header.iter().rposition(|name| looks_like_token_header(name)))
}

/// Header names that plausibly hold an order token
pub fn looks_like_token_header(name: &str) -> bool {
    let key = field_key(name);
    key.contains("token") || key.contains("orderid")
}

/// Required fields missing from a header
pub fn missing_required_fields(header: &[String]) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|required| last_column_named(header, required).is_none())
        .map(|required| required.to_string())
        .collect()
}

fn last_column_named(header: &[String], name: &str) -> Option<usize> {
    let wanted = normalize_name(name);
    header.iter().rposition(|h| normalize_name(h) == wanted)
}

fn local_value(row: &[String], column: usize) -> String {
    row.get(column).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::ReconciliationStatus;
    use crate::services::cell_checks::{NOTE_SUB_ID_UNKNOWN, NOTE_TIMESTAMP_MISMATCH, NOTE_TIMESTAMP_UNREADABLE};
    use crate::models::remote::PaymentStatus;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    type Fixture<'a> = (&'a str, PaymentStatus, Vec<(&'a str, &'a str)>);

    fn index(records: Vec<Fixture<'_>>) -> RemoteOrderIndex {
        RemoteOrderIndex::from_records(records.into_iter().map(|(token, status, raw)| {
            RemoteOrderRecord::new(
                token,
                status,
                raw.into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }))
    }

    #[test]
    fn test_resolve_primary_over_alternates() {
        let header = strings(&["Order ID", "Ordertoken/OrderID", "Token"]);
        assert_eq!(resolve_token_column(&header), Some(1));
    }

    #[test]
    fn test_resolve_alternate_spelling_with_trailing_space() {
        let header = strings(&["Publisher ID", "Ordertoken/Order ID "]);
        assert_eq!(resolve_token_column(&header), Some(1));
    }

    #[test]
    fn test_resolve_pattern_fallback() {
        assert_eq!(resolve_token_column(&strings(&["Token", "Status"])), Some(0));
        assert_eq!(resolve_token_column(&strings(&["Name", "Amount"])), None);
    }

    #[test]
    fn test_duplicate_token_header_reads_later_column() {
        let header = strings(&["Ordertoken/OrderID", "X", "Ordertoken/OrderID"]);
        let idx = index(vec![("PLATFORM-7", PaymentStatus::Confirmed, vec![])]);
        let row = strings(&["PUB-1", "x", "PLATFORM-7"]);

        let annotation = match_row(&row, &header, &idx);

        assert_eq!(annotation.order_token.as_deref(), Some("PLATFORM-7"));
        assert_eq!(annotation.status(), Some(ReconciliationStatus::Bestaetigt));
        assert_eq!(
            annotation.cell("Ordertoken/OrderID").and_then(CellAnnotation::value),
            Some("PLATFORM-7")
        );
    }

    #[test]
    fn test_duplicate_token_header_ignores_earlier_column() {
        let header = strings(&["Ordertoken/OrderID", "X", "Ordertoken/OrderID"]);
        let idx = index(vec![("PUB-1", PaymentStatus::Confirmed, vec![])]);
        let row = strings(&["PUB-1", "x", "PLATFORM-7"]);

        let annotation = match_row(&row, &header, &idx);
        assert_eq!(
            annotation.outcome,
            RowOutcome::NoMatch {
                token: "PLATFORM-7".to_string()
            }
        );
    }

    #[test]
    fn test_no_match_keeps_local_values() {
        let header = strings(&["Ordertoken/OrderID", "Publisher", STATUS_FIELD]);
        let idx = index(vec![("ORD-1", PaymentStatus::Open, vec![("publisher", "Remote")])]);
        let row = strings(&["ORD-999", "Publisher", ""]);

        let annotation = match_row(&row, &header, &idx);

        assert_eq!(annotation.cell("Ordertoken/OrderID").unwrap().value(), Some("ORD-999"));
        assert_eq!(annotation.cell("Ordertoken/OrderID").unwrap().status(), Some(CellStatus::Invalid));
        assert_eq!(annotation.cell("Publisher").unwrap().value(), Some("Publisher"));
        assert_eq!(annotation.cell(STATUS_FIELD), Some(&CellAnnotation::Absent));
        assert_eq!(annotation.status(), None);
        assert!(annotation.remark_advertiser.is_none());
    }

    #[test]
    fn test_matched_takes_remote_values() {
        let header = strings(&["Ordertoken/OrderID", "SubID", "Publisher ID", STATUS_FIELD]);
        let idx = index(vec![(
            "T1",
            PaymentStatus::PaidOut,
            vec![("sub_id", "S-REMOTE"), ("ordertoken", "T1")],
        )]);
        let row = strings(&["T1", "S-LOCAL", "P-9", "offen"]);

        let annotation = match_row(&row, &header, &idx);

        assert_eq!(annotation.cell("SubID").unwrap().value(), Some("S-REMOTE"));
        assert_eq!(annotation.cell("SubID").unwrap().status(), Some(CellStatus::Ok));
        assert_eq!(annotation.cell("Publisher ID").unwrap().value(), Some("P-9"));
        assert_eq!(annotation.cell("Publisher ID").unwrap().status(), Some(CellStatus::Empty));
        assert_eq!(annotation.cell(STATUS_FIELD).unwrap().value(), Some("ausgezahlt"));
        assert!(annotation.is_locked());
        assert_eq!(annotation.remark_advertiser.as_deref(), Some(REMARK_ADVERTISER_MATCHED));
    }

    #[test]
    fn test_matched_timestamp_on_another_day_is_flagged() {
        let header = strings(&["Ordertoken/OrderID", "Timestamp"]);
        let idx = index(vec![
            ("T1", PaymentStatus::Open, vec![("timestamp", "2024-05-03 10:00:00")]),
            ("T2", PaymentStatus::Open, vec![("timestamp", "2024-05-03T09:00:00Z")]),
        ]);

        let other_day = match_row(&strings(&["T1", "02.05.2024"]), &header, &idx);
        assert_eq!(
            other_day.cell("Timestamp"),
            Some(&CellAnnotation::with_note(
                "2024-05-03 10:00:00",
                CellStatus::Invalid,
                NOTE_TIMESTAMP_MISMATCH
            ))
        );
        assert!(matches!(other_day.outcome, RowOutcome::Matched { .. }));

        let same_day = match_row(&strings(&["T2", "03.05.2024 18:30"]), &header, &idx);
        assert_eq!(
            same_day.cell("Timestamp"),
            Some(&CellAnnotation::present("2024-05-03T09:00:00Z", CellStatus::Ok))
        );
    }

    #[test]
    fn test_unreadable_local_timestamp_is_invalid() {
        let header = strings(&["Ordertoken/OrderID", "Timestamp"]);
        let idx = index(vec![("T1", PaymentStatus::Open, vec![])]);

        let unmatched = match_row(&strings(&["T9", "letzte Woche"]), &header, &idx);
        assert_eq!(
            unmatched.cell("Timestamp"),
            Some(&CellAnnotation::with_note("letzte Woche", CellStatus::Invalid, NOTE_TIMESTAMP_UNREADABLE))
        );

        let readable = match_row(&strings(&["T9", "03.05.2024"]), &header, &idx);
        assert_eq!(readable.cell("Timestamp").unwrap().status(), Some(CellStatus::Ok));
    }

    #[test]
    fn test_sub_id_checked_against_whole_window() {
        let header = strings(&["Ordertoken/OrderID", "SubID"]);
        let idx = index(vec![
            ("T1", PaymentStatus::Open, vec![("subid", "S-1")]),
            ("T2", PaymentStatus::Open, vec![]),
        ]);

        let known = match_row(&strings(&["T9", "S-1"]), &header, &idx);
        assert!(matches!(known.outcome, RowOutcome::NoMatch { .. }));
        assert_eq!(known.cell("SubID").unwrap().status(), Some(CellStatus::Ok));
        assert_eq!(known.remark_advertiser.as_deref(), Some(REMARK_ADVERTISER_MATCHED));
        assert_eq!(known.remark_publisher.as_deref(), Some(REMARK_PUBLISHER_MATCHED));

        let unknown = match_row(&strings(&["T9", "S-404"]), &header, &idx);
        assert_eq!(
            unknown.cell("SubID"),
            Some(&CellAnnotation::with_note("S-404", CellStatus::Invalid, NOTE_SUB_ID_UNKNOWN))
        );
        assert!(unknown.remark_advertiser.is_none());

        let matched_without_remote = match_row(&strings(&["T2", "S-404"]), &header, &idx);
        assert_eq!(matched_without_remote.cell("SubID").unwrap().status(), Some(CellStatus::Invalid));
    }

    #[test]
    fn test_unrecognized_status_is_invalid() {
        let header = strings(&["Token"]);
        let idx = index(vec![("A1", PaymentStatus::parse("7"), vec![])]);

        let annotation = match_row(&strings(&["A1"]), &header, &idx);

        assert_eq!(annotation.status(), None);
        assert_eq!(annotation.cell(STATUS_FIELD).unwrap().status(), Some(CellStatus::Invalid));
        assert_eq!(annotation.cell(STATUS_FIELD).unwrap().value(), Some("7"));
        assert_eq!(annotation.outcome, RowOutcome::UnrecognizedStatus { raw: "7".to_string() });
    }

    #[test]
    fn test_blank_token_is_missing() {
        let header = strings(&["Ordertoken/OrderID", "SubID"]);
        let idx = index(vec![("", PaymentStatus::Open, vec![])]);

        let annotation = match_row(&strings(&["  ", "S1"]), &header, &idx);

        assert_eq!(annotation.outcome, RowOutcome::MissingToken);
        assert_eq!(annotation.cell("Ordertoken/OrderID").unwrap().status(), Some(CellStatus::Empty));
    }

    #[test]
    fn test_short_row_reads_empty_cells() {
        let header = strings(&["Ordertoken/OrderID", "SubID", "Timestamp"]);
        let idx = index(vec![("T1", PaymentStatus::Open, vec![("timestamp", "2024-05-01")])]);

        let annotation = match_row(&strings(&["T1"]), &header, &idx);

        assert_eq!(annotation.cell("SubID").unwrap().value(), Some(""));
        assert_eq!(annotation.cell("Timestamp").unwrap().value(), Some("2024-05-01"));
    }

    #[test]
    fn test_no_token_column_degrades() {
        let header = strings(&["Name", "Amount"]);
        let idx = index(vec![("T1", PaymentStatus::Open, vec![])]);

        let annotation = match_row(&strings(&["Alice", "10"]), &header, &idx);

        assert_eq!(
            annotation.outcome,
            RowOutcome::Degraded {
                reason: DegradedReason::NoTokenColumn
            }
        );
        assert_eq!(annotation.cell("Name").unwrap().value(), Some("Alice"));
    }

    #[test]
    fn test_empty_header_degrades() {
        let annotation = match_row(&strings(&["T1"]), &[], &RemoteOrderIndex::default());
        assert!(annotation.is_degraded());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let header = strings(&["Ordertoken/OrderID", "SubID", "Ordertoken/OrderID", "Timestamp"]);
        let idx = index(vec![
            ("T1", PaymentStatus::Canceled, vec![("subid", "S"), ("timestamp", "t")]),
            ("T2", PaymentStatus::parse("x"), vec![]),
        ]);
        let matcher = RowMatcher::new(&header);

        for row in [
            strings(&["a", "b", "T1", "c"]),
            strings(&["a", "b", "T2"]),
            strings(&["a", "b", "T3", "c"]),
            Vec::new(),
        ] {
            let first = matcher.match_row(&row, &idx);
            for _ in 0..5 {
                assert_eq!(matcher.match_row(&row, &idx), first);
            }
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let header = strings(&["Publisher ID", "subid", "Ordertoken/OrderID "]);
        let missing = missing_required_fields(&header);

        assert!(missing.contains(&"Timestamp".to_string()));
        assert!(!missing.contains(&"SubID".to_string()));
        assert!(!missing.contains(&"Ordertoken/OrderID".to_string()));
        assert_eq!(missing.len(), REQUIRED_FIELDS.len() - 3);
    }
}
