//! Shared fixtures for ordr-rv integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ordr_common::events::EventBus;
use ordr_rv::models::{
    CampaignContext, DocumentId, PaymentStatus, ReconciliationReport, RemoteOrderRecord, SessionSnapshot,
    TabularDocument,
};
use ordr_rv::services::{
    EngineConfig, FetchError, MemoryFileProvider, MemoryReportStore, OrderSource, ReportStore,
    SessionHandle, ValidationService,
};

/// What the stub network does when asked for orders
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Records(Vec<RemoteOrderRecord>),
    Fail(FetchError),
    /// Never answers
    Hang,
}

/// Order source with scripted behavior and an optional response delay
pub struct StubOrderSource {
    behavior: StubBehavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubOrderSource {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn records(records: Vec<RemoteOrderRecord>) -> Self {
        Self::new(StubBehavior::Records(records))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSource for StubOrderSource {
    async fn fetch_orders(&self, _campaign: &CampaignContext) -> Result<Vec<RemoteOrderRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            StubBehavior::Records(records) => Ok(records.clone()),
            StubBehavior::Fail(err) => Err(err.clone()),
            StubBehavior::Hang => std::future::pending().await,
        }
    }
}

pub fn campaign() -> CampaignContext {
    CampaignContext::new(
        "campaign-1",
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
    )
}

pub fn order(token: &str, status: &str) -> RemoteOrderRecord {
    RemoteOrderRecord::new(token, PaymentStatus::parse(status), BTreeMap::new())
}

pub fn order_with(token: &str, status: &str, fields: &[(&str, &str)]) -> RemoteOrderRecord {
    RemoteOrderRecord::new(
        token,
        PaymentStatus::parse(status),
        fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    )
}

/// Document from rows of string slices; `None` marks a malformed row
pub fn document(rows: Vec<Option<Vec<&str>>>) -> TabularDocument {
    TabularDocument::from_grid(
        rows.into_iter()
            .map(|row| row.map(|cells| cells.into_iter().map(String::from).collect()))
            .collect(),
    )
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        fetch_timeout: Duration::from_secs(5),
        progress_tick: Duration::from_millis(10),
    }
}

/// Service wiring over in-memory collaborators
pub struct TestHarness {
    pub files: Arc<MemoryFileProvider>,
    pub store: Arc<MemoryReportStore>,
    pub event_bus: EventBus,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            files: Arc::new(MemoryFileProvider::new()),
            store: Arc::new(MemoryReportStore::new(64)),
            event_bus: EventBus::new(1000),
        }
    }

    pub async fn with_document(self, id: u64, doc: TabularDocument) -> Self {
        self.files.insert(DocumentId(id), doc).await;
        self
    }

    pub async fn with_rows(self, id: u64, rows: Vec<Option<Vec<&str>>>) -> Self {
        self.with_document(id, document(rows)).await
    }

    pub async fn store_report(&self, id: u64) -> Option<ReconciliationReport> {
        self.store.get(DocumentId(id)).await.expect("memory store never fails")
    }

    pub fn service(&self, source: Arc<dyn OrderSource>, config: EngineConfig) -> ValidationService {
        let store: Arc<dyn ReportStore> = self.store.clone();
        ValidationService::new(self.files.clone(), source, store, self.event_bus.clone(), config)
    }
}

/// Wait until a session reaches DONE or FAILED
pub async fn wait_for_terminal(handle: &SessionHandle) -> SessionSnapshot {
    let mut rx = handle.watch();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            if rx.borrow().state.is_terminal() {
                return rx.borrow().clone();
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    })
    .await
    .expect("session did not finish in time")
}

/// Wait until a session is fetching
pub async fn wait_for_fetching(handle: &SessionHandle) {
    let mut rx = handle.watch();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            if rx.borrow().state != ordr_rv::models::SessionState::Pending {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .expect("session did not start fetching in time")
}
