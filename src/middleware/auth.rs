// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token authentication for the identity API.

use crate::error::AppError;
use crate::identity::{IdentityState, TokenKind};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

/// Authenticated caller extracted from an access token.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: u64,
}

/// Middleware that requires a valid access token for an active, unlocked
/// account, issued since its last password change.
pub async fn require_bearer(
    State(state): State<Arc<IdentityState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state
        .tokens
        .verify(token, TokenKind::Access)
        .map_err(|_| AppError::InvalidToken)?;

    let user_id = claims.user_id().ok_or(AppError::InvalidToken)?;

    if !state.directory.accepts_token(user_id, claims.ver, Utc::now()) {
        tracing::info!(user_id, "Rejected token for locked, disabled or re-keyed account");
        return Err(AppError::Unauthorized);
    }

    request.extensions_mut().insert(Principal { user_id });

    Ok(next.run(request).await)
}
