//! Report persistence in SQLite
//!
//! Reports are stored whole as JSON, one row per document. The upsert only
//! replaces a row when the incoming report is at least as fresh, so a slow
//! run finishing late never overwrites a newer result.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ordr_common::{Error, Result};

use crate::models::document::DocumentId;
use crate::models::report::ReconciliationReport;
use crate::services::report_store::ReportStore;

/// Durable report store
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored reports
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM validation_reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn document_key(document_id: DocumentId) -> Result<i64> {
    i64::try_from(document_id.0)
        .map_err(|_| Error::InvalidInput(format!("Document id {} out of range", document_id)))
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn get(&self, document_id: DocumentId) -> Result<Option<ReconciliationReport>> {
        let row = sqlx::query("SELECT report FROM validation_reports WHERE document_id = ?")
            .bind(document_key(document_id)?)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.get("report");
        let report = serde_json::from_str(&json).map_err(|e| {
            Error::Internal(format!("Stored report for document {} is corrupt: {}", document_id, e))
        })?;
        Ok(Some(report))
    }

    async fn put(&self, report: &ReconciliationReport) -> Result<bool> {
        let document_id = document_key(report.document_id)?;
        let freshness = i64::try_from(report.freshness)
            .map_err(|_| Error::Internal(format!("Freshness {} out of range", report.freshness)))?;
        let json = serde_json::to_string(report)?;

        let result = sqlx::query(
            r#"
            INSERT INTO validation_reports (document_id, freshness, produced_at, report)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                freshness = excluded.freshness,
                produced_at = excluded.produced_at,
                report = excluded.report
            WHERE excluded.freshness >= validation_reports.freshness
            "#,
        )
        .bind(document_id)
        .bind(freshness)
        .bind(report.produced_at.to_rfc3339())
        .bind(&json)
        .execute(&self.pool)
        .await?;

        let stored = result.rows_affected() > 0;
        tracing::debug!(
            document_id = %report.document_id,
            freshness = report.freshness,
            stored,
            "Report upsert"
        );
        Ok(stored)
    }

    async fn remove(&self, document_id: DocumentId) -> Result<()> {
        sqlx::query("DELETE FROM validation_reports WHERE document_id = ?")
            .bind(document_key(document_id)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM validation_reports")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
