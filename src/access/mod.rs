// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization: predicates, the route guard and navigation filtering.

pub mod guard;
pub mod navigation;
pub mod predicates;

pub use guard::{GuardOutcome, RouteGuard, RouteRequirement};
pub use navigation::{filter_navigation, NavigationItem, NAVIGATION_ITEMS};
