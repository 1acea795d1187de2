// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static navigation menu and role-based filtering.

use super::predicates::{has_any_permission, has_any_role};
use crate::models::{Permission, PermissionSet, Role};
use serde::Serialize;

/// One entry of the static navigation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    pub name: &'static str,
    pub href: &'static str,
    pub icon: &'static str,
    #[serde(skip)]
    pub roles: &'static [Role],
    #[serde(skip)]
    pub permissions: &'static [Permission],
}

const ALL_ROLES: &[Role] = &Role::ALL;

use Role::*;

pub static NAVIGATION_ITEMS: &[NavigationItem] = &[
    NavigationItem {
        name: "Dashboard",
        href: "/dashboard",
        icon: "bar-chart",
        roles: ALL_ROLES,
        permissions: &[],
    },
    NavigationItem {
        name: "Tables",
        href: "/tables",
        icon: "utensils",
        roles: &[GeneralManager, ShiftSupervisor, Server, Host, Busser],
        permissions: &[],
    },
    NavigationItem {
        name: "Staff",
        href: "/staff",
        icon: "users",
        roles: &[GeneralManager, ShiftSupervisor],
        permissions: &[],
    },
    NavigationItem {
        name: "Customers",
        href: "/customers",
        icon: "user",
        roles: &[GeneralManager, ShiftSupervisor, Server, Host],
        permissions: &[],
    },
    NavigationItem {
        name: "Inventory",
        href: "/inventory",
        icon: "package",
        roles: &[GeneralManager, HeadChef, SousChef],
        permissions: &[],
    },
    NavigationItem {
        name: "Suppliers",
        href: "/suppliers",
        icon: "file-text",
        roles: &[GeneralManager, HeadChef],
        permissions: &[],
    },
    NavigationItem {
        name: "Reports",
        href: "/reports",
        icon: "trending-up",
        roles: &[GeneralManager, ShiftSupervisor, HeadChef],
        permissions: &[],
    },
    NavigationItem {
        name: "Settings",
        href: "/settings",
        icon: "settings",
        roles: &[GeneralManager],
        permissions: &[],
    },
    NavigationItem {
        name: "Kitchen",
        href: "/kitchen",
        icon: "chef-hat",
        roles: &[HeadChef, SousChef, LineCook],
        permissions: &[],
    },
    NavigationItem {
        name: "Recipes",
        href: "/recipes",
        icon: "file-text",
        roles: &[HeadChef, SousChef],
        permissions: &[],
    },
    NavigationItem {
        name: "My Tables",
        href: "/my-tables",
        icon: "utensils",
        roles: &[Server],
        permissions: &[],
    },
    NavigationItem {
        name: "Reservations",
        href: "/reservations",
        icon: "calendar",
        roles: &[Host, GeneralManager, ShiftSupervisor],
        permissions: &[],
    },
    NavigationItem {
        name: "Bar",
        href: "/bar",
        icon: "coffee",
        roles: &[Bartender],
        permissions: &[],
    },
    NavigationItem {
        name: "Sales",
        href: "/sales",
        icon: "credit-card",
        roles: &[Server, Bartender, GeneralManager, ShiftSupervisor],
        permissions: &[],
    },
];

/// Items visible to `role`, in menu order.
///
/// An item is kept when the role matches and, if the item lists permissions,
/// at least one of them is granted.
pub fn filter_navigation<'a>(
    items: &'a [NavigationItem],
    role: Option<Role>,
    permissions: &PermissionSet,
) -> Vec<&'a NavigationItem> {
    items
        .iter()
        .filter(|item| has_any_role(role, item.roles))
        .filter(|item| has_any_permission(permissions, item.permissions))
        .collect()
}
