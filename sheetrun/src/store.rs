//! Collaborator store boundary: fetch a session's file set by
//! reference.
//!
//! The store itself (sheet persistence, versioning) is another
//! service; this side performs a single lookup per session and treats
//! any failure as terminal for that session. No retry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::{FileEntry, FileSetRef};

/// Lookup of a file set by reference. `Ok(None)` means the reference
/// resolved to nothing.
#[async_trait]
pub trait SheetStore: Send + Sync + fmt::Debug {
    /// Fetch the file set for the given reference.
    async fn fetch_file_set(&self, file_set: &FileSetRef) -> Result<Option<Vec<FileEntry>>>;
}

/// HTTP-backed store client.
#[derive(Debug, Clone)]
pub struct HttpSheetStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSheetStore {
    /// Client against the store at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SheetStore for HttpSheetStore {
    async fn fetch_file_set(&self, file_set: &FileSetRef) -> Result<Option<Vec<FileEntry>>> {
        let url = format!(
            "{}/api/sheets/{}/versions/{}/files",
            self.base_url.trim_end_matches('/'),
            file_set.sheet_id,
            file_set.version_id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("store request failed: {url}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let files = response
            .error_for_status()
            .with_context(|| format!("store returned an error for {file_set}"))?
            .json::<Vec<FileEntry>>()
            .await
            .context("store returned malformed file set")?;
        Ok(Some(files))
    }
}

/// In-memory store for tests and local development.
#[derive(Debug, Default)]
pub struct FakeSheetStore {
    sheets: Mutex<HashMap<(String, String), Vec<FileEntry>>>,
}

impl FakeSheetStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file set under a reference.
    pub fn insert(&self, file_set: &FileSetRef, files: Vec<FileEntry>) {
        self.sheets.lock().unwrap().insert(
            (file_set.sheet_id.clone(), file_set.version_id.clone()),
            files,
        );
    }
}

#[async_trait]
impl SheetStore for FakeSheetStore {
    async fn fetch_file_set(&self, file_set: &FileSetRef) -> Result<Option<Vec<FileEntry>>> {
        Ok(self
            .sheets
            .lock()
            .unwrap()
            .get(&(file_set.sheet_id.clone(), file_set.version_id.clone()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_store_lookup() {
        let store = FakeSheetStore::new();
        let reference = FileSetRef {
            sheet_id: "s1".into(),
            version_id: "v1".into(),
        };
        assert!(store.fetch_file_set(&reference).await.unwrap().is_none());

        store.insert(
            &reference,
            vec![FileEntry::new("main.py", "print(1)", "python")],
        );
        let files = store.fetch_file_set(&reference).await.unwrap().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "main.py");
    }
}
