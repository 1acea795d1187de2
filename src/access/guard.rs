// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard: decides whether a protected view renders, redirects to login,
//! or is denied.
//!
//! Checks run in a fixed order: loading, authentication, roles, permissions.
//! Only the authentication failure produces a navigation; role and permission
//! failures are terminal denials.

use super::predicates::{has_any_role, missing_permissions};
use crate::models::{Permission, Role};
use crate::session::SessionView;

/// Default login destination for unauthenticated visitors.
pub const LOGIN_PATH: &str = "/login";

/// Where a user lands after login when no (valid) destination was preserved.
pub const DEFAULT_LANDING: &str = "/dashboard";

/// Access contract for one protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirement {
    pub require_auth: bool,
    pub required_roles: Vec<Role>,
    pub required_permissions: Vec<Permission>,
}

impl Default for RouteRequirement {
    fn default() -> Self {
        Self {
            require_auth: true,
            required_roles: Vec::new(),
            required_permissions: Vec::new(),
        }
    }
}

impl RouteRequirement {
    /// Any authenticated user.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// No authentication required.
    pub fn public() -> Self {
        Self {
            require_auth: false,
            ..Self::default()
        }
    }

    pub fn manager() -> Self {
        Self::authenticated().roles(Role::MANAGERS)
    }

    pub fn kitchen() -> Self {
        Self::authenticated().roles(Role::KITCHEN)
    }

    pub fn front_of_house() -> Self {
        Self::authenticated().roles(Role::FRONT_OF_HOUSE)
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles = roles.into_iter().collect();
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.required_permissions = permissions.into_iter().collect();
        self
    }
}

/// Result of evaluating a guard against the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The authentication check has not settled yet. No redirect is issued.
    Loading,
    /// Navigate to `location`; `fallback` is shown while the redirect is in flight.
    Redirect {
        location: String,
        fallback: Option<String>,
    },
    /// The user's role is not among the required roles.
    AccessDenied {
        role: Option<Role>,
        required: Vec<Role>,
    },
    /// The listed permissions are required but not granted.
    InsufficientPermissions { missing: Vec<Permission> },
    Render,
}

/// A route requirement plus redirect behavior.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    pub requirement: RouteRequirement,
    pub redirect_to: String,
    pub fallback: Option<String>,
}

impl RouteGuard {
    pub fn new(requirement: RouteRequirement) -> Self {
        Self {
            requirement,
            redirect_to: LOGIN_PATH.to_string(),
            fallback: None,
        }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Decide the outcome for a visit to `current_path`.
    pub fn evaluate(&self, session: &SessionView, current_path: &str) -> GuardOutcome {
        let req = &self.requirement;

        if session.is_loading {
            return GuardOutcome::Loading;
        }

        if req.require_auth && !session.is_authenticated {
            return GuardOutcome::Redirect {
                location: login_redirect(&self.redirect_to, current_path),
                fallback: self.fallback.clone(),
            };
        }

        if !has_any_role(session.role, &req.required_roles) {
            return GuardOutcome::AccessDenied {
                role: session.role,
                required: req.required_roles.clone(),
            };
        }

        let missing = missing_permissions(&session.permissions, &req.required_permissions);
        if !missing.is_empty() {
            return GuardOutcome::InsufficientPermissions { missing };
        }

        GuardOutcome::Render
    }
}

/// Login location preserving the original destination,
/// e.g. `/login?redirect=%2Fdashboard`.
pub fn login_redirect(login_path: &str, current_path: &str) -> String {
    format!("{}?redirect={}", login_path, urlencoding::encode(current_path))
}

/// Resolve a post-login destination. Only local absolute paths are honored;
/// anything else (including protocol-relative `//host` URLs) lands on the
/// dashboard.
pub fn post_login_destination(redirect: Option<&str>) -> String {
    match redirect {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.starts_with(LOGIN_PATH) =>
        {
            path.to_string()
        }
        _ => DEFAULT_LANDING.to_string(),
    }
}

/// Upper-case role labels joined the way the denial page shows them,
/// e.g. `GENERAL MANAGER or SHIFT SUPERVISOR`.
pub fn required_roles_label(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.display_name())
        .collect::<Vec<_>>()
        .join(" or ")
}
