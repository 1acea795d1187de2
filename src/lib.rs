// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Jiko Portal: the sign-in, session and access-control layer of a
//! restaurant staff portal.
//!
//! Each browser context gets an [`session::AuthSession`] backed by its own
//! token store. Protected pages are gated by [`access::RouteGuard`] on the
//! resolved session, and the navigation menu is filtered by role.

pub mod access;
pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod views;

use config::Config;
use identity::IdentityState;
use services::IdentityApi;
use session::SessionRegistry;
use std::sync::Arc;
use views::Views;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    /// Present when the identity API is served from this process.
    pub identity: Option<Arc<IdentityState>>,
    pub views: Views,
}

impl AppState {
    pub fn new(
        config: Config,
        api: Arc<dyn IdentityApi>,
        identity: Option<Arc<IdentityState>>,
    ) -> anyhow::Result<Self> {
        let sessions = SessionRegistry::new(api, config.token_storage(), config.query_policy());
        Ok(Self {
            config,
            sessions,
            identity,
            views: Views::new()?,
        })
    }
}
