use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const USER_ID: &str = "user_id";
pub const USER: &str = "user";

/// Every storage field kept per role.
pub const SESSION_FIELDS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, USER_ID, USER];

/// Portal a session belongs to. Each role owns a disjoint set of storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Public,
    Professional,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Public, Role::Professional, Role::Admin];

    /// Derive the namespace from a navigation path.
    ///
    /// `/admin*` and the admin login/register pages map to [`Role::Admin`],
    /// `/professional*` and its login/register pages to
    /// [`Role::Professional`], anything else to [`Role::Public`].
    pub fn from_path(path: &str) -> Role {
        let matches = |portal: &str| {
            path.starts_with(&format!("/{portal}"))
                || path.starts_with(&format!("/login/{portal}"))
                || path.starts_with(&format!("/register/{portal}"))
        };
        if matches("admin") {
            Role::Admin
        } else if matches("professional") {
            Role::Professional
        } else {
            Role::Public
        }
    }

    pub fn storage_prefix(self) -> &'static str {
        match self {
            Role::Admin => "admin_",
            Role::Professional => "professional_",
            Role::Public => "user_",
        }
    }

    /// Namespaced storage key for one session field.
    pub fn key(self, field: &str) -> String {
        format!("{}{}", self.storage_prefix(), field)
    }

    /// Page the UI should land on once this role's session is torn down.
    pub fn entry_page(self) -> &'static str {
        match self {
            Role::Admin => "/login/admin",
            Role::Public | Role::Professional => "/",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Professional => "professional",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "user" | "patient" => Ok(Role::Public),
            "professional" | "doctor" => Ok(Role::Professional),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
