//! ordr-rv: order reconciliation validator
//!
//! Reconciles uploaded order documents against the network's order records
//! and exposes the engine over HTTP.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, ValidationError};

use axum::Router;
use chrono::{DateTime, Utc};
use ordr_common::events::{EventBus, ValidationEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::services::ValidationService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validation engine
    pub service: ValidationService,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last session failure, for the health endpoint
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: ValidationService) -> Self {
        Self {
            event_bus: service.event_bus().clone(),
            service,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Record session failures from the event bus into `last_error`
    pub fn track_failures(&self) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let last_error = Arc::clone(&self.last_error);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ValidationEvent::SessionFailed {
                        document_id,
                        reason,
                        message,
                        ..
                    }) => {
                        *last_error.write().await =
                            Some(format!("document {}: {} ({})", document_id, message, reason));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Failure tracker lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        // Static route before the parameterized ones
        .route("/validations/events", get(api::validation_event_stream))
        .merge(api::validation_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
