//! Account entity and provisioning input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{DomainError, DomainResult, UserId};

use crate::Role;

/// Minimum accepted password length for new credentials.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A persisted account.
///
/// # Invariants
/// - `email` is unique, trimmed and lowercased.
/// - `roll_number` is only ever set for students.
/// - Accounts are deactivated (`active = false`), never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub roll_number: Option<String>,
    pub active: bool,
    pub created_by: Option<UserId>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            roll_number: self.roll_number.clone(),
            active: self.active,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Public view of an account (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub roll_number: Option<String>,
    pub active: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for provisioning an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub roll_number: Option<String>,
}

impl NewUser {
    /// Normalise and validate provisioning input. The plain password is only
    /// checked here; hashing happens in [`crate::CredentialHasher`].
    pub fn parse(
        name: &str,
        email: &str,
        password: &str,
        role: Role,
        roll_number: Option<&str>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Please provide a name"));
        }

        let email = normalize_email(email);
        if !looks_like_email(&email) {
            return Err(DomainError::validation("Please provide a valid email"));
        }

        validate_password(password)?;

        let roll_number = match role {
            Role::Student => roll_number
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            Role::Admin | Role::Instructor => None,
        };

        Ok(Self {
            name: name.to_string(),
            email,
            role,
            roll_number,
        })
    }

    pub fn into_user(self, password_hash: String, created_by: Option<UserId>, now: DateTime<Utc>) -> User {
        User {
            id: UserId::new(),
            name: self.name,
            email: self.email,
            password_hash,
            role: self.role,
            roll_number: self.roll_number,
            active: true,
            created_by,
            password_changed_at: None,
            created_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_email_and_keeps_student_roll_number() {
        let u = NewUser::parse(" Ada ", "  Ada@Example.COM ", "longenough", Role::Student, Some(" R-1 ")).unwrap();
        assert_eq!(u.name, "Ada");
        assert_eq!(u.email, "ada@example.com");
        assert_eq!(u.roll_number.as_deref(), Some("R-1"));
    }

    #[test]
    fn roll_number_dropped_for_staff() {
        let u = NewUser::parse("Grace", "grace@example.com", "longenough", Role::Instructor, Some("R-2")).unwrap();
        assert_eq!(u.roll_number, None);
    }

    #[test]
    fn rejects_bad_email_and_short_password() {
        assert!(matches!(
            NewUser::parse("A", "nope", "longenough", Role::Student, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            NewUser::parse("A", "a@b.io", "short", Role::Student, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            NewUser::parse("  ", "a@b.io", "longenough", Role::Student, None),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn new_accounts_are_active_without_password_change() {
        let u = NewUser::parse("A", "a@b.io", "longenough", Role::Student, None)
            .unwrap()
            .into_user("hash".into(), None, Utc::now());
        assert!(u.active);
        assert!(u.password_changed_at.is_none());
        let profile = serde_json::to_value(u.profile()).unwrap();
        assert!(profile.get("passwordHash").is_none());
        assert_eq!(profile["role"], "STUDENT");
    }
}
