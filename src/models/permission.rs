// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fine-grained capability grants and the per-role grant table.

use super::Role;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

macro_rules! permissions {
    ($($variant:ident => $name:literal,)+) => {
        /// A capability token. There is no hierarchy among permissions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[cfg_attr(feature = "binding-generation", derive(TS))]
        #[cfg_attr(
            feature = "binding-generation",
            ts(export, export_to = "web/src/lib/generated/")
        )]
        pub enum Permission {
            $($variant,)+
        }

        impl Permission {
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Permission::$variant => $name,)+
                }
            }
        }
    };
}

permissions! {
    Admin => "admin",
    Reports => "reports",
    StaffManagement => "staff_management",
    FinancialData => "financial_data",
    OperationalOversight => "operational_oversight",
    StaffScheduling => "staff_scheduling",
    DiscountApproval => "discount_approval",
    KitchenManagement => "kitchen_management",
    MenuManagement => "menu_management",
    InventoryManagement => "inventory_management",
    KitchenOperations => "kitchen_operations",
    RecipeManagement => "recipe_management",
    InventoryReceiving => "inventory_receiving",
    KitchenDisplay => "kitchen_display",
    OrderPreparation => "order_preparation",
    InventoryUsage => "inventory_usage",
    PosSystem => "pos_system",
    TableManagement => "table_management",
    CustomerProfiles => "customer_profiles",
    PaymentProcessing => "payment_processing",
    Reservations => "reservations",
    TableAssignment => "table_assignment",
    CustomerCheckin => "customer_checkin",
    BarInventory => "bar_inventory",
    BarReporting => "bar_reporting",
    TableStatus => "table_status",
    CleaningCompletion => "cleaning_completion",
}

impl Permission {
    /// Lower-case label with spaces, e.g. `financial data`.
    pub fn display_name(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// The set of permissions granted to a user. Membership test only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    /// Unknown tokens are dropped so a newer identity service cannot break
    /// profile decoding.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Vec<String> = Vec::deserialize(deserializer)?;
        Ok(raw
            .iter()
            .filter_map(|token| match token.parse() {
                Ok(permission) => Some(permission),
                Err(_) => {
                    tracing::warn!(permission = %token, "Ignoring unrecognized permission");
                    None
                }
            })
            .collect())
    }
}

impl Role {
    /// Permissions the identity service grants to each role.
    pub fn default_permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::GeneralManager => &[Admin, Reports, StaffManagement, FinancialData],
            Role::ShiftSupervisor => &[OperationalOversight, StaffScheduling, DiscountApproval],
            Role::HeadChef => &[KitchenManagement, MenuManagement, InventoryManagement],
            Role::SousChef => &[KitchenOperations, RecipeManagement, InventoryReceiving],
            Role::LineCook => &[KitchenDisplay, OrderPreparation, InventoryUsage],
            Role::Server => &[PosSystem, TableManagement, CustomerProfiles, PaymentProcessing],
            Role::Host => &[Reservations, TableAssignment, CustomerCheckin],
            Role::Bartender => &[PosSystem, BarInventory, PaymentProcessing, BarReporting],
            Role::Busser => &[TableStatus, CleaningCompletion],
        }
    }
}
