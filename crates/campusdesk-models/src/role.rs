use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Maintenance,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const SUBMIT_REQUESTS  = 1 << 0;
        const REVIEW_EVENTS    = 1 << 1;
        const RESOLVE_ISSUES   = 1 << 2;
        const AWARD_POINTS     = 1 << 3;
        const VIEW_ALL_EVENTS  = 1 << 4;
        const VIEW_ALL_ISSUES  = 1 << 5;
        const VIEW_SCHEDULE    = 1 << 6;
        /// Read another student's requests, totals and balance.
        const VIEW_ANY_STUDENT = 1 << 7;
        const VIEW_GLOBAL_TOTALS = 1 << 8;
    }
}

impl Capabilities {
    /// Faculty and admins share the same reviewer capabilities.
    pub const STAFF: Capabilities = Self::REVIEW_EVENTS
        .union(Self::AWARD_POINTS)
        .union(Self::VIEW_ALL_EVENTS)
        .union(Self::VIEW_ALL_ISSUES)
        .union(Self::VIEW_SCHEDULE)
        .union(Self::VIEW_ANY_STUDENT)
        .union(Self::VIEW_GLOBAL_TOTALS);
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Faculty, Role::Admin, Role::Maintenance];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Maintenance => "maintenance",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Student => Capabilities::SUBMIT_REQUESTS,
            Role::Faculty | Role::Admin => Capabilities::STAFF,
            Role::Maintenance => {
                Capabilities::RESOLVE_ISSUES
                    | Capabilities::VIEW_ALL_ISSUES
                    | Capabilities::VIEW_SCHEDULE
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            "maintenance" => Ok(Role::Maintenance),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Verified caller identity handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.role.capabilities()
    }
}
