//! Content checks for the Timestamp and SubID columns
//!
//! Timestamps are accepted in the layouts publishers actually upload. On a
//! matched row the local date must fall on the same day as the network's.
//! A SubID is valid when the network knows it for any order of the window.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::annotation::{CellAnnotation, CellStatus};
use crate::models::remote::{field_key, RemoteOrderIndex};

pub const NOTE_TIMESTAMP_UNREADABLE: &str = "Timestamp nicht lesbar";
pub const NOTE_TIMESTAMP_MISMATCH: &str = "Timestamp passt nicht zum Netzwerk";
pub const NOTE_SUB_ID_UNKNOWN: &str = "SubID nicht im Netzwerk gefunden";

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%m/%d/%Y"];

/// Columns that get content checks beyond the blank test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedField {
    Timestamp,
    SubId,
}

impl CheckedField {
    pub fn of(name: &str) -> Option<Self> {
        match field_key(name).as_str() {
            "timestamp" => Some(CheckedField::Timestamp),
            "subid" => Some(CheckedField::SubId),
            _ => None,
        }
    }
}

/// Calendar day of a timestamp in any accepted layout
///
/// RFC 3339 keeps the day of its own offset.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed.date_naive());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|parsed| parsed.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        })
}

/// Local Timestamp cell; `readable` is the status of a parseable value
pub fn timestamp_cell(local: &str, readable: CellStatus) -> CellAnnotation {
    if local.trim().is_empty() {
        CellAnnotation::present(local, CellStatus::Empty)
    } else if parse_flexible_date(local).is_none() {
        CellAnnotation::with_note(local, CellStatus::Invalid, NOTE_TIMESTAMP_UNREADABLE)
    } else {
        CellAnnotation::present(local, readable)
    }
}

/// Timestamp cell of a matched row
///
/// The network value is shown when there is one; a local date on another
/// day (or one that cannot be read) flags the cell.
pub fn matched_timestamp_cell(local: &str, remote: Option<&str>) -> CellAnnotation {
    let Some(remote) = remote else {
        return timestamp_cell(local, CellStatus::Empty);
    };
    if local.trim().is_empty() {
        return CellAnnotation::present(remote, CellStatus::Ok);
    }

    match parse_flexible_date(local) {
        None => CellAnnotation::with_note(remote, CellStatus::Invalid, NOTE_TIMESTAMP_UNREADABLE),
        Some(day) if parse_flexible_date(remote) == Some(day) => {
            CellAnnotation::present(remote, CellStatus::Ok)
        }
        Some(_) => CellAnnotation::with_note(remote, CellStatus::Invalid, NOTE_TIMESTAMP_MISMATCH),
    }
}

/// Local SubID cell, checked against every sub id of the window
pub fn sub_id_cell(local: &str, index: &RemoteOrderIndex) -> CellAnnotation {
    if local.trim().is_empty() {
        CellAnnotation::present(local, CellStatus::Empty)
    } else if index.contains_sub_id(local) {
        CellAnnotation::present(local, CellStatus::Ok)
    } else {
        CellAnnotation::with_note(local, CellStatus::Invalid, NOTE_SUB_ID_UNKNOWN)
    }
}
