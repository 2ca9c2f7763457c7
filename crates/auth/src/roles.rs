use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of an account. Closed set: every decision matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Instructor => "INSTRUCTOR",
            Role::Student => "STUDENT",
        }
    }

    /// Roles allowed to own courses.
    pub fn can_own_courses(&self) -> bool {
        matches!(self, Role::Admin | Role::Instructor)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = lms_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "INSTRUCTOR" => Ok(Role::Instructor),
            "STUDENT" => Ok(Role::Student),
            other => Err(lms_core::DomainError::validation(format!(
                "unknown role '{other}' (expected ADMIN, INSTRUCTOR or STUDENT)"
            ))),
        }
    }
}
