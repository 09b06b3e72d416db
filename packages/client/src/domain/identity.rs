//! Authenticated user identity.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::IdentityError;

/// Portal role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    /// Parses a role case-insensitively after trimming surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "STUDENT" => Ok(Role::Student),
            _ => Err(IdentityError::UnknownRole(s.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The identity of the logged-in user.
///
/// Immutable for the lifetime of a session. Only the session store creates
/// or replaces it; everything else reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub person_name: String,
}

impl UserIdentity {
    pub fn new(
        username: impl Into<String>,
        role: Role,
        email: impl Into<String>,
        person_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            role,
            email: email.into(),
            person_name: person_name.into(),
        }
    }

    /// A student identity with empty contact details.
    pub fn student(username: impl Into<String>) -> Self {
        Self::new(username, Role::Student, "", "")
    }
}
