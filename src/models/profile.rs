//! Application-level user profile and role.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CompanyId;

/// Dashboard role assigned to a profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Company,
    Agent,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Company, Role::Agent, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Company => "company",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(Role::Company),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Row of the `users` table, keyed by the identity subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_row_deserializes_with_null_company() {
        let row = json!({
            "id": "7d9f1c1e-3b8a-4a43-9a55-1f1f2d7b0c11",
            "email": "agent@example.com",
            "role": "agent",
            "company_id": null,
            "created_at": "2025-01-05T10:00:00+00:00",
            "updated_at": "2025-01-05T10:00:00.123456+00:00"
        });

        let profile: Profile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.role, Role::Agent);
        assert!(profile.company_id.is_none());
    }

    #[test]
    fn role_parses_only_known_names() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("authenticated".parse::<Role>().is_err());
        assert_eq!(Role::Company.to_string(), "company");
    }
}
