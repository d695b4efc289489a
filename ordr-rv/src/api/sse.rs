//! Server-Sent Events for validation sessions

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /validations/events
///
/// Streams SessionStarted, ProgressUpdate, SessionCompleted and
/// SessionFailed events as JSON, preceded by a ConnectionStatus event.
pub async fn validation_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    ordr_common::sse::event_bus_sse_stream("ordr-rv", &state.event_bus)
}
