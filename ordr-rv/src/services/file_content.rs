//! Document content providers
//!
//! The engine only ever reads documents. Parsing spreadsheets happens
//! upstream; uploads reach this service as JSON grids (one array per row).

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use ordr_common::{Error, Result};

use super::row_matcher::REQUIRED_FIELDS;
use crate::models::document::{grid_from_json, DocumentId, TabularDocument};

/// Source of uploaded document content
#[async_trait]
pub trait FileContentProvider: Send + Sync {
    /// Document content, `None` when no such document exists
    async fn get_file_content(&self, document_id: DocumentId) -> Result<Option<TabularDocument>>;
}

/// Reads `<dir>/<document_id>.json`
pub struct DirectoryFileProvider {
    root: PathBuf,
}

impl DirectoryFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, document_id: DocumentId) -> PathBuf {
        self.root.join(format!("{}.json", document_id))
    }
}

#[async_trait]
impl FileContentProvider for DirectoryFileProvider {
    async fn get_file_content(&self, document_id: DocumentId) -> Result<Option<TabularDocument>> {
        let path = self.path_for(document_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(document_id = %document_id, path = %path.display(), "Document file not found");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            Error::InvalidInput(format!("Document {} is not valid JSON: {}", document_id, e))
        })?;
        let grid = grid_from_json(&value)
            .map_err(|e| Error::InvalidInput(format!("Document {}: {}", document_id, e)))?;

        Ok(Some(TabularDocument::from_grid_detect_header(grid, REQUIRED_FIELDS)))
    }
}

/// In-memory documents, for tests and embedding
#[derive(Default)]
pub struct MemoryFileProvider {
    documents: RwLock<HashMap<DocumentId, TabularDocument>>,
}

impl MemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document_id: DocumentId, document: TabularDocument) {
        self.documents.write().await.insert(document_id, document);
    }

    pub async fn remove(&self, document_id: DocumentId) -> Option<TabularDocument> {
        self.documents.write().await.remove(&document_id)
    }
}

#[async_trait]
impl FileContentProvider for MemoryFileProvider {
    async fn get_file_content(&self, document_id: DocumentId) -> Result<Option<TabularDocument>> {
        Ok(self.documents.read().await.get(&document_id).cloned())
    }
}
