// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser-context session cookie.

use crate::session::SESSION_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Registry id of the session attached to the request. `None` for a browser
/// context that has not signed in.
#[derive(Debug, Clone)]
pub struct SessionId(pub Option<String>);

/// Attach the caller's [`AuthSession`](crate::session::AuthSession) to the
/// request.
///
/// A request without a known session cookie gets an unregistered anonymous
/// session. No cookie is set here; the login handler issues one.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (id, session) = match state.sessions.lookup(presented.as_deref()) {
        Some((id, session)) => (Some(id), session),
        None => (None, state.sessions.anonymous()),
    };

    request.extensions_mut().insert(session);
    request.extensions_mut().insert(SessionId(id));
    next.run(request).await
}

pub fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}
