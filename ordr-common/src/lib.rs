//! # ORDR Common Library
//!
//! Shared code for the order reconciliation services:
//! - Error type and result alias
//! - TOML configuration loading and resolution
//! - Validation event types and the EventBus
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
