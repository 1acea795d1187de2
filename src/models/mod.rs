// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod permission;
pub mod role;
pub mod user;

pub use permission::{Permission, PermissionSet};
pub use role::{Role, RoleClass};
pub use user::{Credentials, LoginRequest, LoginResponse, StaffProfile, UserProfile};
