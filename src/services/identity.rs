// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the identity API (login, profile, logout).
//!
//! Handles:
//! - Credential exchange at login
//! - Profile fetch with a bearer access token
//! - Best-effort refresh-token revocation at logout
//! - Classification of failures (auth rejection vs. transient)

use crate::models::{LoginRequest, LoginResponse, UserProfile};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Identity API failure, classified for retry and sign-out decisions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is locked: {0}")]
    AccountLocked(String),

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Identity API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Identity API unreachable: {0}")]
    Transport(String),

    #[error("Invalid identity API response: {0}")]
    Decode(String),
}

impl IdentityError {
    /// 401/403: the credentials are not (or no longer) accepted.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, IdentityError::Unauthorized | IdentityError::Forbidden)
    }

    /// Network failures, rate limiting and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            IdentityError::Transport(_) => true,
            IdentityError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// The identity endpoints consumed by the session layer.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// `POST /login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, IdentityError>;

    /// `GET /profile` with a bearer access token.
    async fn profile(&self, access_token: &str) -> Result<UserProfile, IdentityError>;

    /// `POST /logout`, revoking the refresh token.
    async fn logout(&self, refresh_token: &str) -> Result<(), IdentityError>;
}

/// Error body returned by the identity API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Clone, Copy)]
enum Endpoint {
    Login,
    Profile,
    Logout,
}

/// `reqwest` implementation of [`IdentityApi`].
#[derive(Clone)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://host/api/auth`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<T, IdentityError> {
        let response = Self::check_response(response, endpoint).await?;
        response
            .json()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }

    /// Turn a non-success response into a classified error.
    async fn check_response(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<reqwest::Response, IdentityError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body, endpoint))
    }
}

fn classify(status: u16, body: &str, endpoint: Endpoint) -> IdentityError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

    if let Some(err) = &parsed {
        match err.error.as_str() {
            "invalid_credentials" => return IdentityError::InvalidCredentials,
            "account_locked" => {
                return IdentityError::AccountLocked(err.details.clone().unwrap_or_default())
            }
            "account_disabled" => return IdentityError::AccountDisabled,
            _ => {}
        }
    }

    match (endpoint, status) {
        (Endpoint::Login, 401) => IdentityError::InvalidCredentials,
        (Endpoint::Login, 423) => IdentityError::AccountLocked(
            parsed.and_then(|e| e.details).unwrap_or_default(),
        ),
        (Endpoint::Profile | Endpoint::Logout, 401) => IdentityError::Unauthorized,
        (Endpoint::Profile | Endpoint::Logout, 403) => IdentityError::Forbidden,
        _ => IdentityError::Status {
            status,
            body: body.to_string(),
        },
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, IdentityError> {
        let response = self
            .http
            .post(self.url("login"))
            .json(&serde_json::json!({
                "username": request.username,
                "password": request.password,
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Self::check_response_json(response, Endpoint::Login).await
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, IdentityError> {
        let response = self
            .http
            .get(self.url("profile"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Self::check_response_json(response, Endpoint::Profile).await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .post(self.url("logout"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Self::check_response(response, Endpoint::Logout).await?;
        Ok(())
    }
}
