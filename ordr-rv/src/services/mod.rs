//! Services for ordr-rv

pub mod cell_checks;
pub mod document_editor;
pub mod file_content;
pub mod network_client;
pub mod order_extract;
pub mod order_source;
pub mod reconciler;
pub mod report_store;
pub mod row_matcher;
pub mod validation_service;

pub use document_editor::{DocumentEditor, EditRejected};
pub use file_content::{DirectoryFileProvider, FileContentProvider, MemoryFileProvider};
pub use network_client::NetworkOrderClient;
pub use order_extract::extract_orders;
pub use order_source::{FetchError, OrderSource};
pub use reconciler::reconcile_document;
pub use report_store::{LayeredReportStore, MemoryReportStore, ReportStore};
pub use row_matcher::{match_row, resolve_token_column, RowMatcher, PRIMARY_TOKEN_FIELD, REQUIRED_FIELDS};
pub use validation_service::{EngineConfig, SessionHandle, ValidationService};
