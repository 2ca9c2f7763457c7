use lms_auth::{Principal, User, UserProfile};

use crate::app::errors::ApiError;

/// Principal context for a request (authenticated identity + current account row).
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    principal: Principal,
    user: User,
}

impl PrincipalContext {
    pub fn new(user: User) -> Self {
        Self {
            principal: Principal::new(user.id, user.role),
            user,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn profile(&self) -> UserProfile {
        self.user.profile()
    }
}

/// What the auth middleware concluded about the caller.
///
/// Inserted into every request's extensions; handlers read it through the
/// extractors in [`crate::middleware`].
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No credentials were presented.
    Anonymous,
    Authenticated(PrincipalContext),
    /// Credentials were presented but did not check out.
    Rejected(ApiError),
}
