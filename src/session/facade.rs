// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session: token store + session query behind one read model.
//!
//! `login` and `logout` are the only writers of the token store and the
//! query cache. Both take the write lock; `logout` also bumps the session
//! epoch, and a login commits only if the epoch it started under is still
//! current. A logout issued while a login is in flight therefore always ends
//! in the anonymous state.

use super::query::{Fetch, QueryPolicy, QueryStatus, SessionQuery};
use super::token_store::{TokenStore, TokenStoreError};
use crate::access::predicates;
use crate::models::user::first_validation_message;
use crate::models::{LoginRequest, Permission, PermissionSet, Role, UserProfile};
use crate::services::identity::{IdentityApi, IdentityError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use validator::Validate;

/// Classified login failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is locked: {0}")]
    AccountLocked(String),

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Login superseded by logout")]
    Cancelled,

    #[error("Failed to store credentials: {0}")]
    Storage(String),

    #[error("Login failed: {0}")]
    Other(String),
}

impl LoginError {
    /// Message suitable for the login form.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Validation(msg) => msg.clone(),
            LoginError::InvalidCredentials => "Invalid username or password".to_string(),
            LoginError::AccountLocked(_) => {
                "Account is locked. Please contact an administrator.".to_string()
            }
            LoginError::AccountDisabled => "This account has been disabled.".to_string(),
            LoginError::Cancelled | LoginError::Storage(_) | LoginError::Other(_) => {
                "Login failed. Please try again.".to_string()
            }
        }
    }
}

impl From<IdentityError> for LoginError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::Unauthorized => {
                LoginError::InvalidCredentials
            }
            IdentityError::AccountLocked(until) => LoginError::AccountLocked(until),
            IdentityError::AccountDisabled | IdentityError::Forbidden => LoginError::AccountDisabled,
            other => LoginError::Other(other.to_string()),
        }
    }
}

/// Read model consumed by the route guard, navigation and pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub user: Option<UserProfile>,
    pub role: Option<Role>,
    pub permissions: PermissionSet,
    pub staff_name: Option<String>,
    pub login_loading: bool,
    pub login_error: Option<LoginError>,
}

impl SessionView {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn authenticated(user: &UserProfile) -> Self {
        Self {
            is_authenticated: true,
            is_loading: false,
            user: Some(user.clone()),
            role: user.profile.current_role,
            permissions: user.profile.permissions.clone(),
            staff_name: user.profile.staff_name.clone(),
            login_loading: false,
            login_error: None,
        }
    }

    pub fn is_manager(&self) -> bool {
        self.role.is_some_and(Role::is_manager)
    }

    pub fn is_kitchen_staff(&self) -> bool {
        self.role.is_some_and(Role::is_kitchen_staff)
    }

    pub fn is_foh_staff(&self) -> bool {
        self.role.is_some_and(Role::is_foh_staff)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        predicates::has_permission(&self.permissions, permission)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        predicates::has_any_role(self.role, roles)
    }
}

/// Decrements the in-flight login counter even if the login future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One browser context's authentication state.
pub struct AuthSession {
    api: Arc<dyn IdentityApi>,
    tokens: Arc<dyn TokenStore>,
    query: Arc<SessionQuery>,
    write_lock: Mutex<()>,
    epoch: AtomicU64,
    logins_in_flight: AtomicUsize,
    login_error: Mutex<Option<LoginError>>,
}

impl AuthSession {
    pub fn new(api: Arc<dyn IdentityApi>, tokens: Arc<dyn TokenStore>, policy: QueryPolicy) -> Self {
        let query = Arc::new(SessionQuery::new(api.clone(), tokens.clone(), policy));
        Self {
            api,
            tokens,
            query,
            write_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
            logins_in_flight: AtomicUsize::new(0),
            login_error: Mutex::new(None),
        }
    }

    pub fn query(&self) -> &Arc<SessionQuery> {
        &self.query
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_login_error(&self, err: Option<LoginError>) {
        *self
            .login_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = err;
    }

    fn login_error(&self) -> Option<LoginError> {
        self.login_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Current state. Never performs I/O.
    pub fn view(&self) -> SessionView {
        let snapshot = self.query.snapshot();
        let has_credentials = self.tokens.is_present();

        let mut view = match snapshot.status {
            QueryStatus::Success(user) if has_credentials => SessionView::authenticated(&user),
            QueryStatus::Loading => SessionView::loading(),
            _ => SessionView::anonymous(),
        };

        view.login_loading = self.logins_in_flight.load(Ordering::SeqCst) > 0;
        view.login_error = self.login_error();
        view
    }

    /// Drive the session query to a definitive answer, then return the view.
    ///
    /// A stale profile is served immediately while a background refetch runs.
    /// An auth rejection signs the session out.
    pub async fn resolve(&self) -> SessionView {
        let snapshot = self.query.snapshot();
        match &snapshot.status {
            QueryStatus::Loading | QueryStatus::Error(_) if !snapshot.is_rejected() => {
                self.settle(self.query.ensure().await);
            }
            QueryStatus::Error(err) => {
                self.sign_out_rejected(snapshot.generation, err);
            }
            QueryStatus::Success(_) if snapshot.is_stale => {
                self.query.revalidate_in_background();
            }
            _ => {}
        }
        self.view()
    }

    /// Force a refetch of the profile (focus/reconnect), superseding any
    /// fetch in flight.
    pub async fn refetch(&self) -> SessionView {
        self.settle(self.query.refetch().await);
        self.view()
    }

    fn settle(&self, fetch: Fetch) {
        if let Fetch::Settled {
            generation,
            result: Err(err),
        } = &fetch
        {
            self.sign_out_rejected(*generation, err);
        }
    }

    /// Sign out after the identity API rejected the credentials, unless the
    /// slot has moved on since the failing fetch (logout, login or a newer
    /// fetch), in which case the rejection is about credentials we no longer
    /// hold.
    fn sign_out_rejected(&self, generation: u64, err: &IdentityError) {
        if !err.is_auth_rejection() {
            return;
        }
        let _w = self.write_guard();
        if !self.query.is_current(generation) {
            tracing::debug!(generation, "Ignoring rejection from a superseded fetch");
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.tokens.clear();
        self.query.clear();
        tracing::info!(error = %err, "Credentials rejected, session signed out");
    }

    /// Exchange username/password for credentials and a profile.
    ///
    /// On success the tokens are stored and the profile is seeded into the
    /// query cache, so the session is authenticated without another round
    /// trip. A failed login leaves the store and cache untouched.
    pub async fn login(&self, request: &LoginRequest) -> Result<UserProfile, LoginError> {
        let request = request.normalized();
        if let Err(errors) = request.validate() {
            let err = LoginError::Validation(first_validation_message(&errors));
            self.set_login_error(Some(err.clone()));
            return Err(err);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let outcome = {
            let _in_flight = InFlight::enter(&self.logins_in_flight);
            self.set_login_error(None);

            match self.api.login(&request).await {
                Ok(response) => {
                    let _w = self.write_guard();
                    if self.epoch.load(Ordering::SeqCst) != epoch {
                        Err(LoginError::Cancelled)
                    } else {
                        match self.tokens.set(&response.credentials()) {
                            Ok(()) => {
                                self.query.seed(response.user.clone());
                                self.query.invalidate();
                                Ok(response.user)
                            }
                            Err(e) => Err(LoginError::Storage(e.to_string())),
                        }
                    }
                }
                Err(err) => Err(LoginError::from(err)),
            }
        };

        match &outcome {
            Ok(user) => {
                tracing::info!(
                    username = %user.username,
                    role = ?user.profile.current_role,
                    "Login successful"
                );
            }
            Err(err) => {
                tracing::warn!(username = %request.username, error = %err, "Login failed");
                self.set_login_error(Some(err.clone()));
            }
        }

        outcome
    }

    /// Move this session's credentials and cached profile into `target` and
    /// leave this one signed out. Nothing is revoked.
    ///
    /// Returns `Ok(false)` when there was nothing to move, e.g. a logout
    /// landed first.
    pub fn transfer_to(&self, target: &AuthSession) -> Result<bool, TokenStoreError> {
        let _w = self.write_guard();
        let Some(credentials) = self.tokens.get() else {
            return Ok(false);
        };

        let snapshot = self.query.snapshot();
        {
            let _t = target.write_guard();
            target.tokens.set(&credentials)?;
            if let QueryStatus::Success(profile) = snapshot.status {
                target.query.seed(profile);
                if snapshot.is_stale {
                    target.query.invalidate();
                }
            }
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.tokens.clear();
        self.query.clear();
        Ok(true)
    }

    /// Sign out locally, then revoke the refresh token in the background.
    ///
    /// Local state is cleared before this returns, whatever happens to the
    /// revoke call. Returns the revoke task when there was a token to revoke
    /// and a runtime to run it on.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let credentials = {
            let _w = self.write_guard();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            let credentials = self.tokens.get();
            self.tokens.clear();
            self.query.clear();
            credentials
        };
        self.set_login_error(None);
        tracing::info!("Session cleared");

        let credentials = credentials?;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime, skipping refresh token revocation");
                return None;
            }
        };

        let api = Arc::clone(&self.api);
        Some(handle.spawn(async move {
            match api.logout(&credentials.refresh_token).await {
                Ok(()) => tracing::debug!("Refresh token revoked"),
                Err(e) => tracing::warn!(error = %e, "Refresh token revocation failed"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_messages() {
        assert_eq!(
            LoginError::InvalidCredentials.user_message(),
            "Invalid username or password"
        );
        assert_eq!(
            LoginError::AccountLocked("until noon".into()).user_message(),
            "Account is locked. Please contact an administrator."
        );
        assert_eq!(
            LoginError::AccountDisabled.user_message(),
            "This account has been disabled."
        );
        assert_eq!(
            LoginError::Other("HTTP 500".into()).user_message(),
            "Login failed. Please try again."
        );
    }

    #[test]
    fn test_identity_errors_map_to_login_errors() {
        assert_eq!(
            LoginError::from(IdentityError::InvalidCredentials),
            LoginError::InvalidCredentials
        );
        assert_eq!(
            LoginError::from(IdentityError::AccountDisabled),
            LoginError::AccountDisabled
        );
        assert!(matches!(
            LoginError::from(IdentityError::Transport("refused".into())),
            LoginError::Other(_)
        ));
    }

    #[test]
    fn test_view_role_classes() {
        let view = SessionView {
            is_authenticated: true,
            role: Some(Role::SousChef),
            ..SessionView::anonymous()
        };
        assert!(view.is_kitchen_staff());
        assert!(!view.is_manager());
        assert!(!view.is_foh_staff());
        assert!(view.has_role(Role::SousChef));
        assert!(view.has_any_role(&[]));
        assert!(!SessionView::anonymous().is_manager());
    }
}
