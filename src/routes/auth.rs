// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in and sign-out routes for the portal.

use crate::access::guard::{post_login_destination, LOGIN_PATH};
use crate::error::{AppError, Result};
use crate::middleware::session::{session_cookie, SessionId};
use crate::models::LoginRequest;
use crate::session::{AuthSession, LoginError, SESSION_COOKIE};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login_submit))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

/// Login form fields. `remember_me` is an HTML checkbox: present when ticked.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub remember_me: Option<String>,
    pub redirect: Option<String>,
}

impl LoginForm {
    fn to_request(&self) -> LoginRequest {
        LoginRequest {
            remember_me: self.remember_me.is_some(),
            ..LoginRequest::new(&self.username, &self.password)
        }
    }
}

fn login_status(err: &LoginError) -> StatusCode {
    match err {
        LoginError::Validation(_) => StatusCode::BAD_REQUEST,
        LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LoginError::AccountLocked(_) => StatusCode::LOCKED,
        LoginError::AccountDisabled => StatusCode::FORBIDDEN,
        LoginError::Cancelled => StatusCode::CONFLICT,
        LoginError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LoginError::Other(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn render_form(
    state: &AppState,
    username: &str,
    redirect: Option<&str>,
    error: Option<String>,
) -> Result<Response> {
    let html = state.views.render(
        "login",
        &json!({
            "title": "Sign in",
            "username": username,
            "redirect": redirect.unwrap_or_default(),
            "error": error,
        }),
    )?;
    Ok(html.into_response())
}

/// Show the login form, or skip it for a session that is already signed in.
async fn login_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if session.resolve().await.is_authenticated {
        let destination = post_login_destination(query.redirect.as_deref());
        return Ok(Redirect::to(&destination).into_response());
    }
    render_form(&state, "", query.redirect.as_deref(), None)
}

/// Sign in. On success the browser context is registered under a new id and
/// the session cookie is (re)issued.
async fn login_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    Extension(SessionId(old_id)): Extension<SessionId>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let outcome = match session.login(&form.to_request()).await {
        Ok(_) => state
            .sessions
            .promote(&session, old_id.as_deref())
            .map_err(AppError::Internal)?
            .ok_or(LoginError::Cancelled),
        Err(err) => Err(err),
    };

    match outcome {
        Ok((id, _)) => {
            let destination = post_login_destination(form.redirect.as_deref());
            let jar = jar.add(session_cookie(id, state.config.secure_cookies()));
            Ok((jar, Redirect::to(&destination)).into_response())
        }
        Err(err) => {
            let mut response = render_form(
                &state,
                form.username.trim(),
                form.redirect.as_deref(),
                Some(err.user_message()),
            )?;
            *response.status_mut() = login_status(&err);
            Ok(response)
        }
    }
}

/// Sign out and return to the login page. Revocation happens in the background.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    Extension(SessionId(id)): Extension<SessionId>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    session.logout();
    if let Some(id) = id {
        state.sessions.remove(&id);
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(LOGIN_PATH))
}
