//! File-backed credential store.
//!
//! Persists the credential document as JSON. Writes go to a sibling
//! temporary file first and are renamed into place, so a crash mid-write
//! leaves either the previous document or the new one, never a torn mix.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::application::{CredentialStore, StoreError};
use crate::domain::Credentials;

/// Credential store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store rooted at the given file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn staging_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let staged = self.staging_path();
        let json = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&staged, &json).await?;
        tokio::fs::rename(&staged, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials {
            client_id: "app".to_string(),
            client_secret: "secret".to_string(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            account_id: Some(42),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));

        store.persist(&sample()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.access_token, "access-1");
        assert_eq!(loaded.refresh_token, "refresh-1");
        assert_eq!(loaded.account_id, Some(42));
    }

    #[tokio::test]
    async fn persist_replaces_the_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));

        store.persist(&sample()).await.unwrap();

        let mut updated = sample();
        updated.access_token = "access-2".to_string();
        updated.refresh_token = "refresh-2".to_string();
        store.persist(&updated).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.access_token, "access-2");
        assert_eq!(loaded.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn load_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load().await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn no_staging_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::new(path.clone());

        store.persist(&sample()).await.unwrap();

        assert!(path.exists());
        assert!(!store.staging_path().exists());
    }
}
