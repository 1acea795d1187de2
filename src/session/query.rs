// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached, deduplicated fetch of the current user's profile.
//!
//! There is exactly one cache slot per session. The query is enabled only
//! while the token store holds credentials.
//!
//! Every fetch is tagged with a generation number and only the latest
//! generation may write the slot, so a response from a superseded fetch is
//! dropped instead of overwriting newer state. `seed` and `clear` also start
//! a new generation.

use super::token_store::TokenStore;
use crate::models::UserProfile;
use crate::services::identity::{IdentityApi, IdentityError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Upper bound on retries after the first attempt.
pub const MAX_RETRIES_CAP: u32 = 3;

/// Retry and freshness settings.
#[derive(Debug, Clone)]
pub struct QueryPolicy {
    /// How long a fetched profile counts as fresh.
    pub stale_after: Duration,
    /// Retries after the first attempt for transient failures (capped at 3).
    pub max_retries: u32,
    /// Base back-off between attempts; attempt `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            max_retries: MAX_RETRIES_CAP,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Resolution state of the query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    /// Disabled: no credentials, nothing to fetch.
    Idle,
    /// Enabled but no result yet (fetch in flight or not started).
    Loading,
    Success(UserProfile),
    Error(IdentityError),
}

/// Outcome of driving the query once.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    /// No credentials, nothing fetched.
    Disabled,
    /// The slot was settled at `generation` with this result.
    Settled {
        generation: u64,
        result: Result<UserProfile, IdentityError>,
    },
    /// A newer fetch, seed or clear overtook this one. Its result was dropped.
    Superseded,
}

impl Fetch {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Fetch::Settled { result: Ok(profile), .. } => Some(profile),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&IdentityError> {
        match self {
            Fetch::Settled { result: Err(err), .. } => Some(err),
            _ => None,
        }
    }
}

/// Point-in-time view of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    pub is_fetching: bool,
    /// Success data older than the staleness window (or invalidated).
    pub is_stale: bool,
    /// Generation of the last write to the slot.
    pub generation: u64,
}

impl QuerySnapshot {
    /// The last fetch failed because the credentials were rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(&self.status, QueryStatus::Error(err) if err.is_auth_rejection())
    }
}

#[derive(Default)]
struct Slot {
    data: Option<UserProfile>,
    /// `None` once invalidated.
    fetched_at: Option<Instant>,
    error: Option<IdentityError>,
    /// Latest generation handed out.
    generation: u64,
    /// Generation of the last write (commit, seed or clear).
    settled: u64,
    /// Generation currently being fetched, if it is still the latest.
    in_flight: Option<u64>,
}

pub struct SessionQuery {
    api: Arc<dyn IdentityApi>,
    tokens: Arc<dyn TokenStore>,
    policy: QueryPolicy,
    slot: Mutex<Slot>,
    /// Serializes `ensure` callers so concurrent readers share one fetch.
    fetch_lock: tokio::sync::Mutex<()>,
}

impl SessionQuery {
    pub fn new(api: Arc<dyn IdentityApi>, tokens: Arc<dyn TokenStore>, mut policy: QueryPolicy) -> Self {
        policy.max_retries = policy.max_retries.min(MAX_RETRIES_CAP);
        Self {
            api,
            tokens,
            policy,
            slot: Mutex::new(Slot::default()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        // Slot updates are single assignments; a poisoned guard is still consistent.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.tokens.is_present()
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        let enabled = self.is_enabled();
        let slot = self.slot();
        let is_fetching = slot.in_flight.is_some();

        let status = if !enabled {
            QueryStatus::Idle
        } else if let Some(err) = &slot.error {
            QueryStatus::Error(err.clone())
        } else if let Some(data) = &slot.data {
            QueryStatus::Success(data.clone())
        } else {
            QueryStatus::Loading
        };

        let is_stale = matches!(status, QueryStatus::Success(_)) && self.is_stale(&slot);

        QuerySnapshot {
            status,
            is_fetching,
            is_stale,
            generation: slot.settled,
        }
    }

    fn is_stale(&self, slot: &Slot) -> bool {
        slot.fetched_at
            .is_none_or(|at| at.elapsed() >= self.policy.stale_after)
    }

    /// True while nothing has been written to the slot since `generation`
    /// was handed out.
    pub fn is_current(&self, generation: u64) -> bool {
        self.slot().generation == generation
    }

    /// Return fresh cached data, or fetch it.
    ///
    /// Concurrent callers are deduplicated: a caller that waited for another
    /// fetch to finish returns that fetch's result instead of issuing its own.
    pub async fn ensure(&self) -> Fetch {
        if !self.is_enabled() {
            return Fetch::Disabled;
        }

        let observed = {
            let slot = self.slot();
            if let (Some(data), None) = (&slot.data, &slot.error) {
                if !self.is_stale(&slot) {
                    return Fetch::Settled {
                        generation: slot.settled,
                        result: Ok(data.clone()),
                    };
                }
            }
            slot.settled
        };

        let _guard = self.fetch_lock.lock().await;

        // Re-check after acquiring the lock: another caller may have settled
        // the slot while we waited.
        {
            let slot = self.slot();
            if slot.settled > observed {
                let result = match (&slot.error, &slot.data) {
                    (Some(err), _) => Err(err.clone()),
                    (None, Some(data)) => Ok(data.clone()),
                    // Cleared while we waited
                    (None, None) => return Fetch::Superseded,
                };
                return Fetch::Settled {
                    generation: slot.settled,
                    result,
                };
            }
        }

        self.run_fetch().await
    }

    /// Start a new fetch unconditionally, superseding any fetch in flight.
    pub async fn refetch(&self) -> Fetch {
        self.run_fetch().await
    }

    /// Spawn a background refetch when the cached profile is stale and no
    /// fetch is running (stale-while-revalidate).
    pub fn revalidate_in_background(self: &Arc<Self>) {
        let snapshot = self.snapshot();
        if !snapshot.is_stale || snapshot.is_fetching {
            return;
        }

        let query = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(err) = query.ensure().await.error() {
                tracing::warn!(error = %err, "Background session revalidation failed");
            }
        });
    }

    async fn run_fetch(&self) -> Fetch {
        let Some(credentials) = self.tokens.get() else {
            return Fetch::Disabled;
        };

        let generation = {
            let mut slot = self.slot();
            slot.generation += 1;
            slot.in_flight = Some(slot.generation);
            slot.generation
        };

        let result = self.fetch_with_retry(&credentials.access_token).await;

        let mut slot = self.slot();
        if slot.generation != generation {
            tracing::debug!(
                generation,
                latest = slot.generation,
                "Discarding superseded session fetch"
            );
            return Fetch::Superseded;
        }

        slot.in_flight = None;
        slot.settled = generation;
        match &result {
            Ok(profile) => {
                slot.data = Some(profile.clone());
                slot.fetched_at = Some(Instant::now());
                slot.error = None;
            }
            Err(err) if err.is_auth_rejection() => {
                slot.data = None;
                slot.fetched_at = None;
                slot.error = Some(err.clone());
            }
            Err(err) => {
                slot.error = Some(err.clone());
            }
        }

        Fetch::Settled { generation, result }
    }

    async fn fetch_with_retry(&self, access_token: &str) -> Result<UserProfile, IdentityError> {
        let mut attempt = 0u32;
        loop {
            match self.api.profile(access_token).await {
                Ok(profile) => return Ok(profile),
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "Session fetch failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay * attempt).await;
                }
                Err(err) => {
                    if err.is_auth_rejection() {
                        tracing::info!(error = %err, "Session rejected by identity API");
                    } else {
                        tracing::error!(attempts = attempt + 1, error = %err, "Session fetch failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Write a profile directly, without a network round trip.
    pub fn seed(&self, profile: UserProfile) {
        let mut slot = self.slot();
        slot.generation += 1;
        slot.settled = slot.generation;
        slot.in_flight = None;
        slot.data = Some(profile);
        slot.fetched_at = Some(Instant::now());
        slot.error = None;
    }

    /// Mark the cached profile stale; it is still served until refetched.
    pub fn invalidate(&self) {
        self.slot().fetched_at = None;
    }

    /// Drop all cached state and discard any fetch in flight.
    pub fn clear(&self) {
        let mut slot = self.slot();
        let generation = slot.generation + 1;
        *slot = Slot {
            generation,
            settled: generation,
            ..Slot::default()
        };
    }
}
