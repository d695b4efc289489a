//! Validation service: drives one session from document load to stored report
//!
//! **Workflow:**
//! 1. Snapshot the document (read-only from here on)
//! 2. FETCHING: build the remote order index under timeout and cancellation,
//!    ticking the synthetic progress estimate
//! 3. MATCHING: reconcile every data row (pure, in memory)
//! 4. DONE: store the report; the store keeps the fresher of concurrent runs
//!
//! Any failure moves the session to FAILED and leaves the stored report as
//! it was.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ordr_common::config::{TomlConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PROGRESS_TICK_MS};
use ordr_common::events::{EventBus, ValidationEvent};

use super::file_content::FileContentProvider;
use super::order_source::OrderSource;
use super::reconciler::reconcile_document;
use super::report_store::ReportStore;
use crate::error::ValidationError;
use crate::models::document::{DocumentId, TabularDocument};
use crate::models::remote::{CampaignContext, RemoteOrderIndex};
use crate::models::report::ReconciliationReport;
use crate::models::validation_session::{SessionSnapshot, SessionState, ValidationSession};

/// Finished sessions kept for status polling before the oldest are dropped
const MAX_FINISHED_SESSIONS: usize = 256;

/// Engine timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for the remote fetch
    pub fetch_timeout: Duration,
    /// Interval of synthetic progress updates while fetching
    pub progress_tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            progress_tick: Duration::from_millis(DEFAULT_PROGRESS_TICK_MS),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs.max(1)),
            progress_tick: Duration::from_millis(config.progress_tick_ms.max(10)),
        }
    }
}

/// Caller-side view of a running or finished session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub document_id: DocumentId,
    cancel: CancellationToken,
    progress: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    fn new(session: &ValidationSession) -> Self {
        Self {
            session_id: session.session_id,
            document_id: session.document_id,
            cancel: session.cancel_token(),
            progress: session.subscribe(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.progress.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.progress.borrow().state.is_terminal()
    }

    /// Watch channel carrying every state and progress change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.progress.clone()
    }
}

/// Validation engine entry point
#[derive(Clone)]
pub struct ValidationService {
    files: Arc<dyn FileContentProvider>,
    orders: Arc<dyn OrderSource>,
    store: Arc<dyn ReportStore>,
    event_bus: EventBus,
    config: EngineConfig,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl ValidationService {
    pub fn new(
        files: Arc<dyn FileContentProvider>,
        orders: Arc<dyn OrderSource>,
        store: Arc<dyn ReportStore>,
        event_bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            files,
            orders,
            store,
            event_bus,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// Validate a document against a campaign and wait for the report
    pub async fn run_validation(
        &self,
        document_id: DocumentId,
        campaign: CampaignContext,
    ) -> Result<ReconciliationReport, ValidationError> {
        let session = self.begin(document_id, campaign).await?;
        self.execute(session).await
    }

    /// Start a validation in the background
    ///
    /// Returns the handle immediately; poll it or subscribe to the event bus
    /// for the outcome.
    pub async fn start_validation(
        &self,
        document_id: DocumentId,
        campaign: CampaignContext,
    ) -> Result<SessionHandle, ValidationError> {
        let session = self.begin(document_id, campaign).await?;
        let handle = SessionHandle::new(&session);

        let service = self.clone();
        let session_id = session.session_id;
        tokio::spawn(async move {
            tracing::debug!(session_id = %session_id, "Background validation task started");
            if let Err(e) = service.execute(session).await {
                tracing::debug!(session_id = %session_id, error = %e, "Background validation ended without report");
            }
        });

        Ok(handle)
    }

    /// Request cancellation of a session
    ///
    /// Only the fetch phase observes cancellation. Returns `false` for unknown
    /// sessions and for sessions already matching or finished.
    pub async fn cancel(&self, session_id: Uuid) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(&session_id) {
            Some(handle) if handle.snapshot().state.accepts_cancel() => {
                tracing::info!(session_id = %session_id, "Cancellation requested");
                handle.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn session(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn session_snapshot(&self, session_id: Uuid) -> Option<SessionSnapshot> {
        self.session(session_id).await.map(|handle| handle.snapshot())
    }

    /// Latest stored report for a document
    pub async fn latest_report(&self, document_id: DocumentId) -> ordr_common::Result<Option<ReconciliationReport>> {
        self.store.get(document_id).await
    }

    pub async fn remove_report(&self, document_id: DocumentId) -> ordr_common::Result<()> {
        self.store.remove(document_id).await
    }

    /// Create and register a PENDING session
    pub async fn begin(
        &self,
        document_id: DocumentId,
        campaign: CampaignContext,
    ) -> Result<ValidationSession, ValidationError> {
        if !campaign.is_valid() {
            return Err(ValidationError::InvalidCampaign(format!(
                "campaign '{}' with window {}..{}",
                campaign.campaign_id, campaign.from_date, campaign.to_date
            )));
        }

        let session = ValidationSession::new(document_id, campaign);
        self.register(SessionHandle::new(&session)).await;

        tracing::info!(
            session_id = %session.session_id,
            document_id = %document_id,
            campaign_id = %session.campaign.campaign_id,
            "Validation session created"
        );

        self.event_bus.emit_lossy(ValidationEvent::SessionStarted {
            session_id: session.session_id,
            document_id: document_id.0,
            campaign_id: session.campaign.campaign_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(session)
    }

    /// Drive a PENDING session to DONE or FAILED
    pub async fn execute(&self, mut session: ValidationSession) -> Result<ReconciliationReport, ValidationError> {
        match self.run_phases(&mut session).await {
            Ok(report) => {
                session.complete_progress();
                self.emit_progress(&session);
                self.transition(&mut session, SessionState::Done);

                tracing::info!(
                    session_id = %session.session_id,
                    document_id = %session.document_id,
                    freshness = report.freshness,
                    matched = report.diagnostics.matched_rows,
                    unmatched = report.diagnostics.unmatched_rows,
                    "Validation session completed"
                );
                self.event_bus.emit_lossy(ValidationEvent::SessionCompleted {
                    session_id: session.session_id,
                    document_id: session.document_id.0,
                    freshness: report.freshness,
                    matched_rows: report.diagnostics.matched_rows,
                    unmatched_rows: report.diagnostics.unmatched_rows,
                    timestamp: Utc::now(),
                });
                Ok(report)
            }
            Err(err) => {
                if let Some(reason) = err.reason() {
                    session.fail(reason);
                }
                self.emit_progress(&session);

                tracing::warn!(
                    session_id = %session.session_id,
                    document_id = %session.document_id,
                    error = %err,
                    "Validation session failed"
                );
                self.event_bus.emit_lossy(ValidationEvent::SessionFailed {
                    session_id: session.session_id,
                    document_id: session.document_id.0,
                    reason: err.reason().map(|r| r.as_str()).unwrap_or("invalid").to_string(),
                    message: err.to_string(),
                    timestamp: Utc::now(),
                });
                Err(err)
            }
        }
    }

    async fn run_phases(&self, session: &mut ValidationSession) -> Result<ReconciliationReport, ValidationError> {
        let cancel = session.cancel_token();
        if cancel.is_cancelled() {
            return Err(ValidationError::SessionCancelled);
        }

        let document = self.load_document(session.document_id).await?;

        self.transition(session, SessionState::Fetching);
        let index = self.fetch_index(session, &cancel).await?;
        if index.is_empty() {
            return Err(ValidationError::NoData(format!(
                "network returned no orders for campaign '{}'",
                session.campaign.campaign_id
            )));
        }

        self.transition(session, SessionState::Matching);
        let prior = match self.store.get(session.document_id).await {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!(document_id = %session.document_id, error = %e, "Could not load previous report");
                None
            }
        };

        let (rows, diagnostics) = reconcile_document(&document, &index, prior.as_ref());
        let report = ReconciliationReport::new(session.document_id, rows, diagnostics);

        match self.store.put(&report).await {
            Ok(true) => {}
            Ok(false) => tracing::info!(
                document_id = %session.document_id,
                "A fresher report is already stored, keeping it"
            ),
            Err(e) => tracing::error!(
                document_id = %session.document_id,
                error = %e,
                "Failed to store report"
            ),
        }

        Ok(report)
    }

    async fn load_document(&self, document_id: DocumentId) -> Result<TabularDocument, ValidationError> {
        let document = self.files.get_file_content(document_id).await.map_err(|e| {
            tracing::warn!(document_id = %document_id, error = %e, "Could not read document");
            ValidationError::NoData(format!("document {} could not be read: {}", document_id, e))
        })?;

        match document {
            Some(document) if document.data_row_count() > 0 => Ok(document),
            Some(_) => Err(ValidationError::NoData(format!("document {} has no data rows", document_id))),
            None => Err(ValidationError::NoData(format!("document {} not found", document_id))),
        }
    }

    /// Remote fetch under timeout and cancellation, ticking progress meanwhile
    async fn fetch_index(
        &self,
        session: &mut ValidationSession,
        cancel: &CancellationToken,
    ) -> Result<RemoteOrderIndex, ValidationError> {
        let campaign = session.campaign.clone();
        let fetch = RemoteOrderIndex::build(self.orders.as_ref(), &campaign);
        tokio::pin!(fetch);

        let deadline = tokio::time::sleep(self.config.fetch_timeout);
        tokio::pin!(deadline);

        let tick = self.config.progress_tick;
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Err(ValidationError::SessionCancelled);
                }
                result = &mut fetch => {
                    return result.map_err(ValidationError::from);
                }
                _ = &mut deadline => {
                    return Err(ValidationError::RemoteFetchTimeout(format!(
                        "no response within {}s",
                        self.config.fetch_timeout.as_secs_f64()
                    )));
                }
                _ = ticker.tick() => {
                    session.advance_progress();
                    self.emit_progress(session);
                }
            }
        }
    }

    fn transition(&self, session: &mut ValidationSession, state: SessionState) {
        if let Some(transition) = session.transition_to(state) {
            tracing::info!(
                session_id = %session.session_id,
                from = transition.old_state.as_str(),
                to = transition.new_state.as_str(),
                "Session state changed"
            );
            self.emit_progress(session);
        }
    }

    fn emit_progress(&self, session: &ValidationSession) {
        self.event_bus.emit_lossy(ValidationEvent::ProgressUpdate {
            session_id: session.session_id,
            state: session.state().as_str().to_string(),
            percent: session.percent(),
            timestamp: Utc::now(),
        });
    }

    async fn register(&self, handle: SessionHandle) {
        let mut sessions = self.sessions.write().await;

        let finished = sessions.values().filter(|h| h.is_finished()).count();
        if finished >= MAX_FINISHED_SESSIONS {
            let mut old: Vec<(Uuid, chrono::DateTime<Utc>)> = sessions
                .values()
                .filter(|h| h.is_finished())
                .map(|h| (h.session_id, h.snapshot().started_at))
                .collect();
            old.sort_by_key(|(_, started_at)| *started_at);
            for (session_id, _) in old.into_iter().take(finished / 2) {
                sessions.remove(&session_id);
            }
        }

        sessions.insert(handle.session_id, handle);
    }
}
