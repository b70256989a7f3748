// Role model shared by token decoding, the policy table and role seeding

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Customer renting vehicles
    Client,
    /// Agency staff performing check-out and check-in
    Employee,
    Admin,
}

impl Role {
    /// Every role provisioned at start-up
    pub const ALL: [Role; 3] = [Role::Client, Role::Employee, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Employee => "EMPLOYEE",
            Role::Admin => "ADMIN",
        }
    }

    /// Name stored in the roles table
    pub fn authority(&self) -> &'static str {
        match self {
            Role::Client => "ROLE_CLIENT",
            Role::Employee => "ROLE_EMPLOYEE",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Employee | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("ROLE_") {
            "CLIENT" => Ok(Role::Client),
            "EMPLOYEE" => Ok(Role::Employee),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}
