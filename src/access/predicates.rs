// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure role and permission checks.
//!
//! An empty requirement list always means "unrestricted", never "deny all".
//! Route configuration relies on that: a route without roles is open to any
//! authenticated user.

use crate::models::{Permission, PermissionSet, Role};

/// True if `required` is empty or `current` is one of the required roles.
pub fn has_any_role(current: Option<Role>, required: &[Role]) -> bool {
    required.is_empty() || current.is_some_and(|role| required.contains(&role))
}

pub fn has_permission(granted: &PermissionSet, permission: Permission) -> bool {
    granted.contains(permission)
}

/// True if every required permission is granted (vacuously true when empty).
pub fn has_all_permissions(granted: &PermissionSet, required: &[Permission]) -> bool {
    required.iter().all(|p| granted.contains(*p))
}

/// True if `required` is empty or at least one of them is granted.
pub fn has_any_permission(granted: &PermissionSet, required: &[Permission]) -> bool {
    required.is_empty() || required.iter().any(|p| granted.contains(*p))
}

/// Required permissions that are not granted, in requirement order, without
/// duplicates.
pub fn missing_permissions(granted: &PermissionSet, required: &[Permission]) -> Vec<Permission> {
    let mut missing = Vec::new();
    for permission in required {
        if !granted.contains(*permission) && !missing.contains(permission) {
            missing.push(*permission);
        }
    }
    missing
}
