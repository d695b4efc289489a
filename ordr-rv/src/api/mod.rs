//! HTTP API handlers for ordr-rv
//!
//! REST endpoints to run and inspect validations, plus an SSE stream of
//! session events.

pub mod health;
pub mod sessions;
pub mod sse;
pub mod validation;

pub use health::health_routes;
pub use sessions::session_routes;
pub use sse::validation_event_stream;
pub use validation::validation_routes;
