//! Order source seam and remote index construction

use async_trait::async_trait;
use thiserror::Error;

use crate::models::remote::{CampaignContext, RemoteOrderIndex, RemoteOrderRecord};

/// Order source errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Remote fetch timed out: {0}")]
    Timeout(String),

    #[error("Remote transport error: {0}")]
    Transport(String),

    #[error("Remote fetch cancelled")]
    Cancelled,
}

/// Remote order data source for one campaign and date window
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_orders(&self, campaign: &CampaignContext) -> Result<Vec<RemoteOrderRecord>, FetchError>;
}

impl RemoteOrderIndex {
    /// Fetch all orders of a campaign window and index them by token
    ///
    /// One collaborator call per build. Timeouts are enforced by the caller.
    pub async fn build(source: &dyn OrderSource, campaign: &CampaignContext) -> Result<Self, FetchError> {
        let records = source.fetch_orders(campaign).await?;
        let fetched = records.len();
        let index = Self::from_records(records);

        tracing::debug!(
            campaign_id = %campaign.campaign_id,
            fetched,
            indexed = index.len(),
            "Built remote order index"
        );

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::remote::PaymentStatus;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct FixedSource(Vec<RemoteOrderRecord>);

    #[async_trait]
    impl OrderSource for FixedSource {
        async fn fetch_orders(&self, _campaign: &CampaignContext) -> Result<Vec<RemoteOrderRecord>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl OrderSource for FailingSource {
        async fn fetch_orders(&self, _campaign: &CampaignContext) -> Result<Vec<RemoteOrderRecord>, FetchError> {
            Err(FetchError::Transport("connection refused".to_string()))
        }
    }

    fn campaign() -> CampaignContext {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        CampaignContext::new("c1", day, day)
    }

    #[tokio::test]
    async fn test_build_indexes_records() {
        let source = FixedSource(vec![
            RemoteOrderRecord::new("A1", PaymentStatus::Open, BTreeMap::new()),
            RemoteOrderRecord::new("A2", PaymentStatus::Confirmed, BTreeMap::new()),
        ]);

        let index = RemoteOrderIndex::build(&source, &campaign()).await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.find("A2").is_some());
    }

    #[tokio::test]
    async fn test_build_propagates_errors() {
        let result = RemoteOrderIndex::build(&FailingSource, &campaign()).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
