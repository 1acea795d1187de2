// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted holder for the access/refresh token pair.

use crate::models::Credentials;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Token store errors
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Storage for one browser context's credentials.
///
/// `get` treats a partially present pair as absent. `clear` is idempotent.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<Credentials>;

    fn set(&self, credentials: &Credentials) -> Result<(), TokenStoreError>;

    fn clear(&self);

    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

/// Persisted layout: one optional value per well-known key.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn complete(&self) -> Option<Credentials> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Credentials {
                    access_token: access.clone(),
                    refresh_token: refresh.clone(),
                })
            }
            _ => None,
        }
    }
}

impl From<&Credentials> for StoredTokens {
    fn from(creds: &Credentials) -> Self {
        Self {
            access_token: Some(creds.access_token.clone()),
            refresh_token: Some(creds.refresh_token.clone()),
        }
    }
}

/// Process-local store. Credentials are lost when the process exits.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Credentials> {
        self.tokens.read().ok()?.complete()
    }

    fn set(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        if let Ok(mut tokens) = self.tokens.write() {
            *tokens = credentials.into();
        }
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut tokens) = self.tokens.write() {
            *tokens = StoredTokens::default();
        }
    }
}

/// JSON-file store that survives a restart of the portal.
///
/// The file is read once on open and kept mirrored in memory; writes go to a
/// temporary file that is renamed over the original.
///
/// File I/O is synchronous and happens on the calling task. Each write is a
/// single small JSON document, issued only on login and logout while the
/// session write lock is held, so it is not moved to the blocking pool.
pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tokens = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt token file");
                StoredTokens::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredTokens::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read token file");
                StoredTokens::default()
            }
        };

        Self {
            path,
            tokens: RwLock::new(tokens),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(tokens)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Credentials> {
        self.tokens.read().ok()?.complete()
    }

    fn set(&self, credentials: &Credentials) -> Result<(), TokenStoreError> {
        let stored = StoredTokens::from(credentials);
        self.persist(&stored)?;
        if let Ok(mut tokens) = self.tokens.write() {
            *tokens = stored;
        }
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut tokens) = self.tokens.write() {
            *tokens = StoredTokens::default();
        }
        self.erase(|p| std::fs::remove_file(p));
    }
}

impl FileTokenStore {
    /// Remove the file, or blank it when it cannot be removed, so cleared
    /// credentials are not picked up again on the next open.
    fn erase(&self, remove: impl FnOnce(&Path) -> std::io::Result<()>) {
        match remove(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove token file, blanking it");
                if let Err(e) = self.persist(&StoredTokens::default()) {
                    tracing::error!(path = %self.path.display(), error = %e, "Failed to blank token file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_memory_store_set_get_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.get().is_none());

        store.set(&creds()).unwrap();
        assert_eq!(store.get(), Some(creds()));

        store.clear();
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileTokenStore::open(&path).set(&creds()).unwrap();

        let reopened = FileTokenStore::open(&path);
        assert_eq!(reopened.get(), Some(creds()));

        reopened.clear();
        assert!(!path.exists());
        assert!(FileTokenStore::open(&path).get().is_none());
    }

    #[test]
    fn test_clear_blanks_file_it_cannot_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stuck.json");
        let store = FileTokenStore::open(&path);
        store.set(&creds()).unwrap();

        store.erase(|_| Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied)));

        assert!(path.exists());
        assert!(FileTokenStore::open(&path).get().is_none());
    }

    #[test]
    fn test_partial_tokens_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"access_token":"only-access"}"#).unwrap();

        assert!(FileTokenStore::open(&path).get().is_none());

        std::fs::write(&path, r#"{"access_token":"a","refresh_token":""}"#).unwrap();
        assert!(FileTokenStore::open(&path).get().is_none());
    }

    #[test]
    fn test_corrupt_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileTokenStore::open(&path);
        assert!(store.get().is_none());
        store.set(&creds()).unwrap();
        assert_eq!(FileTokenStore::open(&path).get(), Some(creds()));
    }
}
