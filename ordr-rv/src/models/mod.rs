//! Data model of the reconciliation engine

pub mod annotation;
pub mod document;
pub mod remote;
pub mod report;
pub mod validation_session;

pub use annotation::{
    CellAnnotation, CellStatus, DegradedReason, ReconciliationStatus, RowAnnotation, RowOutcome,
    STATUS_FIELD,
};
pub use document::{DocumentError, DocumentId, TabularDocument};
pub use remote::{CampaignContext, PaymentStatus, RemoteOrderIndex, RemoteOrderRecord};
pub use report::{
    get_cell_status, get_cell_value, get_row_status, ReconciliationReport, ReportDiagnostics,
};
pub use validation_session::{
    FailureReason, SessionSnapshot, SessionState, StateTransition, ValidationSession,
};
