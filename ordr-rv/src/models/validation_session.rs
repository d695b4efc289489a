//! Validation session state machine
//!
//! `PENDING → FETCHING → MATCHING → DONE`, or `FETCHING → FAILED` /
//! `MATCHING → FAILED`. A session also fails straight from `PENDING` when the
//! document cannot be loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::document::DocumentId;
use super::remote::CampaignContext;

/// Upper bound for the synthetic progress estimate while fetching
pub const MAX_FETCH_PROGRESS: u8 = 90;

/// Session workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, no I/O yet
    Pending,
    /// Remote order fetch in flight
    Fetching,
    /// Applying the row matcher to every data row
    Matching,
    /// Report available
    Done,
    /// No report produced
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Fetching => "fetching",
            SessionState::Matching => "matching",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }

    /// Cancellation is only observed before matching starts
    pub fn accepts_cancel(self) -> bool {
        matches!(self, SessionState::Pending | SessionState::Fetching)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Failed)
                | (Fetching, Matching)
                | (Fetching, Failed)
                | (Matching, Done)
                | (Matching, Failed)
        )
    }
}

/// Why a session failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Timeout,
    TransportError,
    Cancelled,
    NoData,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::TransportError => "transport-error",
            FailureReason::Cancelled => "cancelled",
            FailureReason::NoData => "no-data",
        }
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Observable view of a session for status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub document_id: DocumentId,
    pub state: SessionState,
    /// 0-100
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// In-memory validation session
///
/// Transient and never persisted. Every change is published on a watch
/// channel so pollers always see the latest snapshot.
#[derive(Debug)]
pub struct ValidationSession {
    pub session_id: Uuid,
    pub document_id: DocumentId,
    pub campaign: CampaignContext,
    state: SessionState,
    percent: u8,
    failure: Option<FailureReason>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl ValidationSession {
    pub fn new(document_id: DocumentId, campaign: CampaignContext) -> Self {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            session_id,
            document_id,
            state: SessionState::Pending,
            percent: 0,
            failure: None,
            started_at,
            ended_at: None,
        });

        Self {
            session_id,
            document_id,
            campaign,
            state: SessionState::Pending,
            percent: 0,
            failure: None,
            started_at,
            ended_at: None,
            cancel: CancellationToken::new(),
            snapshot_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    /// Token that aborts the fetch phase when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            document_id: self.document_id,
            state: self.state,
            percent: self.percent,
            failure: self.failure,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    /// Transition to a new state
    ///
    /// Illegal transitions are refused and logged; the state is unchanged.
    pub fn transition_to(&mut self, new_state: SessionState) -> Option<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                session_id = %self.session_id,
                from = self.state.as_str(),
                to = new_state.as_str(),
                "Refusing illegal session transition"
            );
            return None;
        }

        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        self.publish();

        Some(transition)
    }

    /// Bump the synthetic fetch progress; never decreases, never passes 90
    pub fn advance_progress(&mut self) -> u8 {
        if self.state == SessionState::Fetching {
            self.percent = next_progress_estimate(self.percent);
            self.publish();
        }
        self.percent
    }

    /// Success: progress is set to 100 unconditionally
    pub fn complete_progress(&mut self) {
        self.percent = 100;
        self.publish();
    }

    /// Record the failure reason and reset progress to 0
    pub fn fail(&mut self, reason: FailureReason) -> Option<StateTransition> {
        self.failure = Some(reason);
        self.percent = 0;
        self.transition_to(SessionState::Failed)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

/// Next synthetic progress value while fetching
///
/// Closes a tenth of the remaining gap to 90 per tick (at least 1), so the
/// estimate slows down as it approaches the ceiling.
pub fn next_progress_estimate(current: u8) -> u8 {
    if current >= MAX_FETCH_PROGRESS {
        return MAX_FETCH_PROGRESS;
    }
    let step = ((MAX_FETCH_PROGRESS - current) / 10).max(1);
    (current + step).min(MAX_FETCH_PROGRESS)
}
