// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON session endpoints for client-side widgets.

use crate::access::{filter_navigation, NAVIGATION_ITEMS};
use crate::error::{AppError, Result};
use crate::models::role::role_label;
use crate::session::{AuthSession, SessionView};
use crate::AppState;
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/refresh", post(refresh_session))
        .route("/api/navigation", get(get_navigation))
}

// ─── Session ─────────────────────────────────────────────────

/// Current session state.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub username: Option<String>,
    pub staff_name: Option<String>,
    /// Wire name of the role, e.g. `server`
    pub role: Option<String>,
    pub role_label: String,
    pub permissions: Vec<String>,
    pub is_manager: bool,
    pub is_kitchen_staff: bool,
    pub is_foh_staff: bool,
    pub login_loading: bool,
    pub login_error: Option<String>,
}

impl From<&SessionView> for SessionResponse {
    fn from(view: &SessionView) -> Self {
        Self {
            is_authenticated: view.is_authenticated,
            is_loading: view.is_loading,
            username: view.user.as_ref().map(|u| u.username.clone()),
            staff_name: view.staff_name.clone(),
            role: view.role.map(|r| r.as_str().to_string()),
            role_label: role_label(view.role),
            permissions: view.permissions.iter().map(|p| p.as_str().to_string()).collect(),
            is_manager: view.is_manager(),
            is_kitchen_staff: view.is_kitchen_staff(),
            is_foh_staff: view.is_foh_staff(),
            login_loading: view.login_loading,
            login_error: view.login_error.as_ref().map(|e| e.user_message()),
        }
    }
}

async fn get_session(Extension(session): Extension<Arc<AuthSession>>) -> Json<SessionResponse> {
    let view = session.resolve().await;
    Json(SessionResponse::from(&view))
}

/// Force a profile refetch, e.g. when a tab regains focus.
async fn refresh_session(
    Extension(session): Extension<Arc<AuthSession>>,
) -> Json<SessionResponse> {
    let view = session.refetch().await;
    Json(SessionResponse::from(&view))
}

// ─── Navigation ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NavigationEntry {
    pub name: String,
    pub href: String,
    pub icon: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NavigationResponse {
    pub items: Vec<NavigationEntry>,
}

/// Menu items for the signed-in user's role.
async fn get_navigation(
    Extension(session): Extension<Arc<AuthSession>>,
) -> Result<Json<NavigationResponse>> {
    let view = session.resolve().await;
    if !view.is_authenticated {
        return Err(AppError::Unauthorized);
    }

    let items = filter_navigation(NAVIGATION_ITEMS, view.role, &view.permissions)
        .into_iter()
        .map(|item| NavigationEntry {
            name: item.name.to_string(),
            href: item.href.to_string(),
            icon: item.icon.to_string(),
        })
        .collect();

    Ok(Json(NavigationResponse { items }))
}
