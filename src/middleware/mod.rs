// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, sessions, security headers).

pub mod auth;
pub mod security;
pub mod session;

pub use auth::require_bearer;
pub use session::attach_session;
