// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staff roles and the role classes derived from them.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The single job-function classification of a staff user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Role {
    GeneralManager,
    ShiftSupervisor,
    HeadChef,
    SousChef,
    LineCook,
    Server,
    Host,
    Bartender,
    Busser,
}

/// Coarse grouping of roles. Every role belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleClass {
    Manager,
    Kitchen,
    FrontOfHouse,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::GeneralManager,
        Role::ShiftSupervisor,
        Role::HeadChef,
        Role::SousChef,
        Role::LineCook,
        Role::Server,
        Role::Host,
        Role::Bartender,
        Role::Busser,
    ];

    pub const MANAGERS: [Role; 2] = [Role::GeneralManager, Role::ShiftSupervisor];
    pub const KITCHEN: [Role; 3] = [Role::HeadChef, Role::SousChef, Role::LineCook];
    pub const FRONT_OF_HOUSE: [Role; 4] = [Role::Server, Role::Host, Role::Bartender, Role::Busser];

    /// Wire name, e.g. `general_manager`.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::GeneralManager => "general_manager",
            Role::ShiftSupervisor => "shift_supervisor",
            Role::HeadChef => "head_chef",
            Role::SousChef => "sous_chef",
            Role::LineCook => "line_cook",
            Role::Server => "server",
            Role::Host => "host",
            Role::Bartender => "bartender",
            Role::Busser => "busser",
        }
    }

    /// Upper-case label shown on denial pages, e.g. `GENERAL MANAGER`.
    pub fn display_name(self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }

    pub fn class(self) -> RoleClass {
        match self {
            Role::GeneralManager | Role::ShiftSupervisor => RoleClass::Manager,
            Role::HeadChef | Role::SousChef | Role::LineCook => RoleClass::Kitchen,
            Role::Server | Role::Host | Role::Bartender | Role::Busser => RoleClass::FrontOfHouse,
        }
    }

    pub fn is_manager(self) -> bool {
        self.class() == RoleClass::Manager
    }

    pub fn is_kitchen_staff(self) -> bool {
        self.class() == RoleClass::Kitchen
    }

    pub fn is_foh_staff(self) -> bool {
        self.class() == RoleClass::FrontOfHouse
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Deserialize an optional role, mapping blank or unrecognized values to `None`.
///
/// The identity service sends `""` for users without a staff record.
pub fn deserialize_optional_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None | Some("") => None,
        Some(value) => match value.parse() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(role = %value, "Ignoring unrecognized role");
                None
            }
        },
    })
}

/// Display label for an optional role, as shown to the user.
pub fn role_label(role: Option<Role>) -> String {
    role.map(Role::display_name)
        .unwrap_or_else(|| "No role assigned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(Role::Server.display_name(), "SERVER");
        assert_eq!(Role::GeneralManager.display_name(), "GENERAL MANAGER");
        assert_eq!(Role::SousChef.display_name(), "SOUS CHEF");
        assert_eq!(role_label(None), "No role assigned");
    }

    #[test]
    fn test_role_classes_are_mutually_exclusive() {
        for role in Role::ALL {
            let flags = [role.is_manager(), role.is_kitchen_staff(), role.is_foh_staff()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{role}");
        }
        assert!(Role::ShiftSupervisor.is_manager());
        assert!(Role::LineCook.is_kitchen_staff());
        assert!(Role::Busser.is_foh_staff());
    }

    #[test]
    fn test_parse_roundtrip_and_unknown() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("dishwasher".parse::<Role>().is_err());
    }

    #[test]
    fn test_optional_role_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_optional_role")]
            role: Option<Role>,
        }

        let parse = |json: &str| serde_json::from_str::<Wrapper>(json).unwrap().role;

        assert_eq!(parse(r#"{"role":"head_chef"}"#), Some(Role::HeadChef));
        assert_eq!(parse(r#"{"role":""}"#), None);
        assert_eq!(parse(r#"{"role":null}"#), None);
        assert_eq!(parse(r#"{"role":"owner"}"#), None);
    }
}
