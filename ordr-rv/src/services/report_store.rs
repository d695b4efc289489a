//! Report persistence seam
//!
//! Every store keeps at most one report per document and never lets a stale
//! report overwrite a fresher one, so concurrent sessions resolve to "last
//! successful run wins".

use async_trait::async_trait;
use lru::LruCache;
use std::sync::Arc;
use tokio::sync::Mutex;

use ordr_common::Result;

use crate::models::document::DocumentId;
use crate::models::report::ReconciliationReport;

/// Keyed report storage
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, document_id: DocumentId) -> Result<Option<ReconciliationReport>>;

    /// Store a report unless a fresher one is already present
    ///
    /// Returns whether `report` was stored.
    async fn put(&self, report: &ReconciliationReport) -> Result<bool>;

    async fn remove(&self, document_id: DocumentId) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// In-process report cache
///
/// When an insert pushes the cache over capacity, the least recently used
/// half of the entries is dropped in one sweep.
pub struct MemoryReportStore {
    cache: Mutex<LruCache<DocumentId, ReconciliationReport>>,
    capacity: usize,
}

impl MemoryReportStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::unbounded()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    /// Cached document ids, most recently used first
    pub async fn document_ids(&self) -> Vec<DocumentId> {
        self.cache.lock().await.iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn get(&self, document_id: DocumentId) -> Result<Option<ReconciliationReport>> {
        Ok(self.cache.lock().await.get(&document_id).cloned())
    }

    async fn put(&self, report: &ReconciliationReport) -> Result<bool> {
        let mut cache = self.cache.lock().await;

        if let Some(existing) = cache.get(&report.document_id) {
            if !report.supersedes(existing) {
                tracing::debug!(
                    document_id = %report.document_id,
                    freshness = report.freshness,
                    existing = existing.freshness,
                    "Ignoring stale report"
                );
                return Ok(false);
            }
        }

        cache.put(report.document_id, report.clone());

        if cache.len() > self.capacity {
            let evict = cache.len() / 2;
            for _ in 0..evict {
                cache.pop_lru();
            }
            tracing::info!(evicted = evict, remaining = cache.len(), "Report cache over capacity, evicted oldest half");
        }

        Ok(true)
    }

    async fn remove(&self, document_id: DocumentId) -> Result<()> {
        self.cache.lock().await.pop(&document_id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.lock().await.clear();
        Ok(())
    }
}

/// Cache in front of a durable store
///
/// Reads fall through to the backing store and warm the cache. Writes go to
/// the backing store first; the cache only mirrors what was accepted there.
pub struct LayeredReportStore {
    cache: MemoryReportStore,
    backing: Arc<dyn ReportStore>,
}

impl LayeredReportStore {
    pub fn new(cache: MemoryReportStore, backing: Arc<dyn ReportStore>) -> Self {
        Self { cache, backing }
    }
}

#[async_trait]
impl ReportStore for LayeredReportStore {
    async fn get(&self, document_id: DocumentId) -> Result<Option<ReconciliationReport>> {
        if let Some(report) = self.cache.get(document_id).await? {
            return Ok(Some(report));
        }
        let report = self.backing.get(document_id).await?;
        if let Some(report) = &report {
            self.cache.put(report).await?;
        }
        Ok(report)
    }

    async fn put(&self, report: &ReconciliationReport) -> Result<bool> {
        let stored = self.backing.put(report).await?;
        if stored {
            self.cache.put(report).await?;
        } else {
            // A fresher report exists in the backing store; drop our cached view.
            self.cache.remove(report.document_id).await?;
        }
        Ok(stored)
    }

    async fn remove(&self, document_id: DocumentId) -> Result<()> {
        self.backing.remove(document_id).await?;
        self.cache.remove(document_id).await
    }

    async fn clear(&self) -> Result<()> {
        self.backing.clear().await?;
        self.cache.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::ReportDiagnostics;

    fn report(id: u64) -> ReconciliationReport {
        ReconciliationReport::new(DocumentId(id), Vec::new(), ReportDiagnostics::default())
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryReportStore::new(4);
        let r = report(1);

        assert!(store.put(&r).await.unwrap());
        assert_eq!(store.get(DocumentId(1)).await.unwrap(), Some(r));

        store.remove(DocumentId(1)).await.unwrap();
        assert!(store.get(DocumentId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_put_ignored() {
        let store = MemoryReportStore::new(4);
        let older = report(1);
        let newer = report(1);

        assert!(store.put(&newer).await.unwrap());
        assert!(!store.put(&older).await.unwrap());
        assert_eq!(store.get(DocumentId(1)).await.unwrap().unwrap().freshness, newer.freshness);
    }

    #[tokio::test]
    async fn test_overflow_evicts_least_recently_used_half() {
        let store = MemoryReportStore::new(4);
        for id in 1..=4 {
            store.put(&report(id)).await.unwrap();
        }
        // Touch 1 so 2 and 3 are the oldest.
        store.get(DocumentId(1)).await.unwrap();

        store.put(&report(5)).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert!(store.get(DocumentId(2)).await.unwrap().is_none());
        assert!(store.get(DocumentId(3)).await.unwrap().is_none());
        assert!(store.get(DocumentId(1)).await.unwrap().is_some());
        assert!(store.get(DocumentId(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_layered_reads_through_and_respects_backing() {
        let backing = Arc::new(MemoryReportStore::new(16));
        let r = report(9);
        backing.put(&r).await.unwrap();

        let layered = LayeredReportStore::new(MemoryReportStore::new(16), backing.clone());
        assert_eq!(layered.get(DocumentId(9)).await.unwrap(), Some(r.clone()));

        let stale = ReconciliationReport {
            freshness: r.freshness - 1,
            ..report(9)
        };
        assert!(!layered.put(&stale).await.unwrap());
        assert_eq!(layered.get(DocumentId(9)).await.unwrap(), Some(r));

        layered.clear().await.unwrap();
        assert!(backing.get(DocumentId(9)).await.unwrap().is_none());
    }
}
