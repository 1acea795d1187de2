// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One [`AuthSession`] per signed-in browser context, keyed by the session
//! cookie.

use super::facade::AuthSession;
use super::query::QueryPolicy;
use super::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::services::identity::IdentityApi;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Name of the browser-context cookie.
pub const SESSION_COOKIE: &str = "jiko_session";

/// Random bytes per session id (encodes to 43 URL-safe characters).
const SESSION_ID_BYTES: usize = 32;

/// Where each session's credentials are kept.
#[derive(Debug, Clone)]
pub enum TokenStorage {
    Memory,
    /// One `<id>.json` file per session under this directory.
    Directory(PathBuf),
}

struct Entry {
    session: Arc<AuthSession>,
    last_seen: Instant,
}

/// Shared registry of live sessions.
pub struct SessionRegistry {
    api: Arc<dyn IdentityApi>,
    storage: TokenStorage,
    policy: QueryPolicy,
    sessions: DashMap<String, Entry>,
    rng: SystemRandom,
}

impl SessionRegistry {
    pub fn new(api: Arc<dyn IdentityApi>, storage: TokenStorage, policy: QueryPolicy) -> Self {
        Self {
            api,
            storage,
            policy,
            sessions: DashMap::new(),
            rng: SystemRandom::new(),
        }
    }

    /// Find the registered session for a presented cookie value.
    ///
    /// With file storage, an id from a previous process is re-attached, but
    /// only when its credentials file exists. Malformed ids are never used.
    pub fn lookup(&self, id: Option<&str>) -> Option<(String, Arc<AuthSession>)> {
        let id = id.filter(|id| is_valid_session_id(id))?;

        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.last_seen = Instant::now();
            return Some((id.to_string(), entry.session.clone()));
        }

        match &self.storage {
            TokenStorage::Directory(dir) if dir.join(format!("{id}.json")).is_file() => {
                tracing::debug!("Re-attached persisted browser session");
                Some((id.to_string(), self.attach(id)))
            }
            _ => None,
        }
    }

    /// A session for a browser context that has not signed in.
    ///
    /// It is not registered and keeps its state in memory; a successful login
    /// moves it into the registry with [`SessionRegistry::promote`].
    pub fn anonymous(&self) -> Arc<AuthSession> {
        Arc::new(AuthSession::new(
            self.api.clone(),
            Arc::new(MemoryTokenStore::new()),
            self.policy.clone(),
        ))
    }

    /// Move a freshly signed-in session under a newly generated id.
    ///
    /// The id the browser presented before login (if any) is forgotten, so a
    /// cookie value planted before login never identifies the signed-in
    /// context. Returns `None` when `from` holds no credentials.
    pub fn promote(
        &self,
        from: &AuthSession,
        old_id: Option<&str>,
    ) -> anyhow::Result<Option<(String, Arc<AuthSession>)>> {
        let id = self.generate_id()?;
        let session = self.attach(&id);

        if !from.transfer_to(&session)? {
            self.sessions.remove(&id);
            return Ok(None);
        }

        if let Some(old_id) = old_id {
            self.sessions.remove(old_id);
        }
        tracing::debug!(rotated = old_id.is_some(), "Registered signed-in browser session");
        Ok(Some((id, session)))
    }

    /// Forget a session, e.g. after logout.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn attach(&self, id: &str) -> Arc<AuthSession> {
        let entry = self.sessions.entry(id.to_string()).or_insert_with(|| Entry {
            session: Arc::new(AuthSession::new(
                self.api.clone(),
                self.token_store(id),
                self.policy.clone(),
            )),
            last_seen: Instant::now(),
        });
        entry.session.clone()
    }

    fn token_store(&self, id: &str) -> Arc<dyn TokenStore> {
        match &self.storage {
            TokenStorage::Memory => Arc::new(MemoryTokenStore::new()),
            TokenStorage::Directory(dir) => {
                Arc::new(FileTokenStore::open(dir.join(format!("{id}.json"))))
            }
        }
    }

    fn generate_id(&self) -> anyhow::Result<String> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("System RNG failure"))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forget sessions not seen for `max_idle`.
    ///
    /// Only the in-memory handle is dropped; file-backed credentials stay on
    /// disk and are re-attached if the browser returns.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_seen.elapsed() < max_idle);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            tracing::info!(pruned, remaining = self.sessions.len(), "Pruned idle sessions");
        }
        pruned
    }
}

/// Session ids are the URL-safe base64 of [`SESSION_ID_BYTES`] random bytes.
/// Anything else (in particular path separators) is rejected.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == 43
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
