// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Embedded identity API: login, token refresh, logout, profile, password
//! change, session check, unlock.
//!
//! Mounted under `/api/auth` when enabled. The portal talks to it through
//! [`crate::services::HttpIdentityClient`] like any remote identity service.

pub mod directory;
pub mod tokens;

pub use directory::{
    LoginFailure, NewAccount, PasswordChangeFailure, UserDirectory, DEMO_PASSWORD,
};
pub use tokens::{Claims, TokenError, TokenIssuer, TokenKind};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{require_bearer, Principal};
use crate::models::{LoginResponse, Permission, PermissionSet, Role, UserProfile};
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state of the identity API.
pub struct IdentityState {
    pub directory: UserDirectory,
    pub tokens: TokenIssuer,
}

impl IdentityState {
    pub fn from_config(config: &Config) -> Self {
        let directory = if config.seed_demo_accounts {
            tracing::info!("Seeding demo accounts");
            UserDirectory::with_demo_accounts(config.password_pepper.clone())
        } else {
            UserDirectory::new(config.password_pepper.clone())
        };

        Self {
            directory,
            tokens: TokenIssuer::new(
                &config.jwt_signing_key,
                config.access_token_ttl,
                config.refresh_token_ttl,
            ),
        }
    }
}

/// Build the identity router. Paths are relative to the mount point.
pub fn router<S>(state: Arc<IdentityState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let protected = Router::new()
        .route("/profile", get(profile))
        .route("/change-password", post(change_password))
        .route("/check", get(check))
        .route("/unlock", post(unlock))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlockBody {
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Minimal identity of the bearer, for clients that only need to know who is
/// signed in.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub current_role: Option<Role>,
    pub permissions: PermissionSet,
    pub staff_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn login(
    State(state): State<Arc<IdentityState>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>> {
    let (Some(username), Some(password)) = (
        body.username.filter(|u| !u.trim().is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Must include \"username\" and \"password\".".to_string(),
        ));
    };

    let user = match state.directory.authenticate(&username, &password, Utc::now()) {
        Ok(user) => user,
        Err(failure) => {
            tracing::warn!(
                event = "login_failed",
                username = %username.trim(),
                reason = ?failure,
                "Login failed"
            );
            return Err(match failure {
                LoginFailure::InvalidCredentials => AppError::InvalidCredentials,
                LoginFailure::Locked { until } => AppError::AccountLocked(until.to_rfc3339()),
                LoginFailure::Disabled => AppError::AccountDisabled,
            });
        }
    };

    let version = state.directory.token_version(user.id).unwrap_or_default();
    let credentials = state.tokens.issue_pair(user.id, version)?;

    tracing::info!(
        event = "login_success",
        user_id = user.id,
        username = %user.username,
        role = ?user.profile.current_role,
        "Login succeeded"
    );

    Ok(Json(LoginResponse {
        access_token: credentials.access_token,
        refresh_token: credentials.refresh_token,
        user,
    }))
}

async fn refresh(
    State(state): State<Arc<IdentityState>>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<RefreshResponse>> {
    let (claims, access_token) = state
        .tokens
        .refresh(&body.refresh_token)
        .map_err(|_| AppError::InvalidToken)?;

    let user_id = claims.user_id().ok_or(AppError::InvalidToken)?;
    if !state.directory.accepts_token(user_id, claims.ver, Utc::now()) {
        return Err(AppError::Unauthorized);
    }

    tracing::info!(event = "token_refresh", user_id, "Access token refreshed");
    Ok(Json(RefreshResponse { access_token }))
}

async fn logout(
    State(state): State<Arc<IdentityState>>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<MessageResponse>> {
    let claims = state
        .tokens
        .revoke(&body.refresh_token)
        .map_err(|_| AppError::BadRequest("Invalid refresh token".to_string()))?;

    tracing::info!(event = "logout", user_id = %claims.sub, "Refresh token revoked");
    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

async fn profile(
    State(state): State<Arc<IdentityState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserProfile>> {
    state
        .directory
        .profile(principal.user_id, Utc::now())
        .map(Json)
        .ok_or(AppError::Unauthorized)
}

/// Minimum length for a new password, matching the login form rule.
const MIN_PASSWORD_LEN: usize = 6;

async fn change_password(
    State(state): State<Arc<IdentityState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Json<MessageResponse>> {
    let (Some(old_password), Some(new_password), Some(confirm_password)) =
        (body.old_password, body.new_password, body.confirm_password)
    else {
        return Err(AppError::BadRequest(
            "Must include \"old_password\", \"new_password\" and \"confirm_password\"."
                .to_string(),
        ));
    };
    if new_password != confirm_password {
        return Err(AppError::BadRequest("New passwords don't match.".to_string()));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let version = state
        .directory
        .change_password(principal.user_id, &old_password, &new_password)
        .map_err(|failure| match failure {
            PasswordChangeFailure::IncorrectPassword => {
                AppError::BadRequest("Old password is incorrect.".to_string())
            }
            PasswordChangeFailure::UnknownAccount => AppError::Unauthorized,
        })?;

    tracing::info!(
        event = "password_changed",
        user_id = principal.user_id,
        token_version = version,
        "Password changed, outstanding tokens invalidated"
    );
    Ok(Json(MessageResponse {
        message: "Password changed successfully. Please log in again.".to_string(),
    }))
}

async fn check(
    State(state): State<Arc<IdentityState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<AuthCheckResponse>> {
    let user = state
        .directory
        .profile(principal.user_id, Utc::now())
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(AuthCheckResponse {
        authenticated: true,
        user_id: user.id,
        username: user.username,
        email: user.email,
        current_role: user.profile.current_role,
        permissions: user.profile.permissions,
        staff_name: user.profile.staff_name,
    }))
}

async fn unlock(
    State(state): State<Arc<IdentityState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<UnlockBody>,
) -> Result<Json<MessageResponse>> {
    let now = Utc::now();
    let caller = state
        .directory
        .profile(principal.user_id, now)
        .ok_or(AppError::Unauthorized)?;
    if !caller.profile.permissions.contains(Permission::Admin) {
        return Err(AppError::Forbidden(
            "Admin permission required".to_string(),
        ));
    }

    let was_locked = state
        .directory
        .unlock(body.user_id, now)
        .ok_or_else(|| AppError::NotFound(format!("user {}", body.user_id)))?;

    tracing::info!(
        event = "account_unlocked",
        user_id = body.user_id,
        by = principal.user_id,
        was_locked,
        "Account unlocked"
    );
    Ok(Json(MessageResponse {
        message: "Account unlocked".to_string(),
    }))
}
