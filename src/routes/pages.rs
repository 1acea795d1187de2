// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guarded portal pages.

use crate::access::guard::{required_roles_label, DEFAULT_LANDING};
use crate::access::{filter_navigation, GuardOutcome, RouteGuard, RouteRequirement, NAVIGATION_ITEMS};
use crate::error::Result;
use crate::models::role::role_label;
use crate::models::{Permission, Role, RoleClass};
use crate::session::{AuthSession, SessionView};
use crate::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Seconds before the loading page asks the browser to retry.
const LOADING_REFRESH_SECS: u32 = 1;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(|| async { Redirect::to(DEFAULT_LANDING) }))
        .route("/dashboard", get(dashboard))
        .route("/staff", get(staff))
        .route("/tables", get(tables))
        .route("/customers", get(customers))
        .route("/kitchen", get(kitchen))
        .route("/settings", get(settings))
}

/// Outcome of running a route guard for a page request.
pub enum Gate {
    Open(SessionView),
    Closed(Response),
}

/// Resolve the session and run `guard` for the request path (with query).
///
/// Every outcome other than render is turned into the response to send.
pub async fn run_guard(
    state: &AppState,
    session: &AuthSession,
    guard: &RouteGuard,
    uri: &Uri,
) -> Result<Gate> {
    let view = session.resolve().await;
    let current = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let response = match guard.evaluate(&view, current) {
        GuardOutcome::Render => return Ok(Gate::Open(view)),
        GuardOutcome::Loading => {
            let html = state.views.render(
                "loading",
                &json!({ "title": "Loading", "refresh": LOADING_REFRESH_SECS }),
            )?;
            html.into_response()
        }
        GuardOutcome::Redirect { location, fallback } => {
            tracing::debug!(from = current, to = %location, "Redirecting to login");
            let html = state.views.render(
                "redirect",
                &json!({ "title": "Sign in", "location": location, "fallback": fallback }),
            )?;
            (StatusCode::SEE_OTHER, [(header::LOCATION, location)], html).into_response()
        }
        GuardOutcome::AccessDenied { role, required } => {
            tracing::info!(path = current, role = ?role, "Access denied by role");
            let html = state.views.render(
                "access_denied",
                &PageChrome::new(&view, "Access Denied").with(json!({
                    "role": role.map(Role::display_name).unwrap_or_else(|| role_label(None)),
                    "required": required_roles_label(&required),
                    "back": DEFAULT_LANDING,
                })),
            )?;
            (StatusCode::FORBIDDEN, html).into_response()
        }
        GuardOutcome::InsufficientPermissions { missing } => {
            tracing::info!(path = current, missing = missing.len(), "Missing permissions");
            let missing: Vec<String> = missing.iter().map(|p| p.display_name()).collect();
            let html = state.views.render(
                "insufficient_permissions",
                &PageChrome::new(&view, "Insufficient Permissions").with(json!({
                    "missing": missing,
                    "back": DEFAULT_LANDING,
                })),
            )?;
            (StatusCode::FORBIDDEN, html).into_response()
        }
    };

    Ok(Gate::Closed(response))
}

#[derive(Serialize)]
struct NavLink {
    name: &'static str,
    href: &'static str,
    icon: &'static str,
}

/// Title and navigation shared by every signed-in page.
#[derive(Serialize)]
struct PageChrome {
    title: String,
    nav: Vec<NavLink>,
    staff_name: String,
    role_label: String,
    #[serde(flatten)]
    extra: serde_json::Value,
}

impl PageChrome {
    fn new(view: &SessionView, title: &str) -> Self {
        let nav = filter_navigation(NAVIGATION_ITEMS, view.role, &view.permissions)
            .into_iter()
            .map(|item| NavLink {
                name: item.name,
                href: item.href,
                icon: item.icon,
            })
            .collect();

        let staff_name = view
            .staff_name
            .clone()
            .or_else(|| view.user.as_ref().map(|u| u.username.clone()))
            .unwrap_or_default();

        Self {
            title: title.to_string(),
            nav,
            staff_name,
            role_label: role_label(view.role),
            extra: json!({}),
        }
    }

    fn with(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

struct PageContent {
    title: &'static str,
    heading: &'static str,
    description: &'static str,
}

async fn guarded_page(
    state: &AppState,
    session: &AuthSession,
    uri: &Uri,
    requirement: RouteRequirement,
    content: PageContent,
) -> Result<Response> {
    let view = match run_guard(state, session, &RouteGuard::new(requirement), uri).await? {
        Gate::Open(view) => view,
        Gate::Closed(response) => return Ok(response),
    };

    let html = state.views.render(
        "page",
        &PageChrome::new(&view, content.title).with(json!({
            "heading": content.heading,
            "description": content.description,
        })),
    )?;
    Ok(html.into_response())
}

/// Dashboard variant for a role class.
fn dashboard_content(role: Option<Role>) -> PageContent {
    match role {
        Some(Role::Host) => PageContent {
            title: "Host Dashboard",
            heading: "Host Dashboard",
            description: "Reservations, waitlist and seating at a glance.",
        },
        Some(role) => match role.class() {
            RoleClass::Manager => PageContent {
                title: "Manager Dashboard",
                heading: "Manager Dashboard",
                description: "Sales, staffing and operations for today's service.",
            },
            RoleClass::Kitchen => PageContent {
                title: "Kitchen Dashboard",
                heading: "Kitchen Dashboard",
                description: "Open tickets, prep lists and stock alerts.",
            },
            RoleClass::FrontOfHouse => PageContent {
                title: "Service Dashboard",
                heading: "Service Dashboard",
                description: "Your tables, orders and tips for this shift.",
            },
        },
        None => PageContent {
            title: "Dashboard",
            heading: "Dashboard",
            description: "No role has been assigned to your account yet.",
        },
    }
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    let guard = RouteGuard::new(RouteRequirement::authenticated());
    let view = match run_guard(&state, &session, &guard, &uri).await? {
        Gate::Open(view) => view,
        Gate::Closed(response) => return Ok(response),
    };

    let content = dashboard_content(view.role);
    let greeting = view
        .staff_name
        .as_deref()
        .map(|name| format!("Karibu, {name}"));
    let chrome = PageChrome::new(&view, content.title);
    let cards: Vec<_> = chrome
        .nav
        .iter()
        .filter(|link| link.href != DEFAULT_LANDING)
        .map(|link| json!({ "name": link.name, "href": link.href }))
        .collect();

    let html = state.views.render(
        "page",
        &chrome.with(json!({
            "heading": content.heading,
            "description": content.description,
            "greeting": greeting,
            "cards": cards,
        })),
    )?;
    Ok(html.into_response())
}

async fn staff(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    guarded_page(
        &state,
        &session,
        &uri,
        RouteRequirement::manager(),
        PageContent {
            title: "Staff",
            heading: "Staff Management",
            description: "Schedules, roles and accounts for the whole team.",
        },
    )
    .await
}

async fn tables(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    use Role::*;
    guarded_page(
        &state,
        &session,
        &uri,
        RouteRequirement::authenticated().roles([GeneralManager, ShiftSupervisor, Server, Host, Busser]),
        PageContent {
            title: "Tables",
            heading: "Table Management",
            description: "Floor plan, table status and assignments.",
        },
    )
    .await
}

async fn customers(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    use Role::*;
    guarded_page(
        &state,
        &session,
        &uri,
        RouteRequirement::authenticated().roles([GeneralManager, ShiftSupervisor, Server, Host]),
        PageContent {
            title: "Customers",
            heading: "Customers",
            description: "Guest profiles, preferences and visit history.",
        },
    )
    .await
}

async fn kitchen(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    guarded_page(
        &state,
        &session,
        &uri,
        RouteRequirement::kitchen(),
        PageContent {
            title: "Kitchen",
            heading: "Kitchen Display",
            description: "Incoming orders by station, oldest first.",
        },
    )
    .await
}

async fn settings(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<AuthSession>>,
    uri: Uri,
) -> Result<Response> {
    guarded_page(
        &state,
        &session,
        &uri,
        RouteRequirement::authenticated()
            .roles([Role::GeneralManager])
            .permissions([Permission::Admin]),
        PageContent {
            title: "Settings",
            heading: "Settings",
            description: "Restaurant details, integrations and security policy.",
        },
    )
    .await
}
