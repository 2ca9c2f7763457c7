use thiserror::Error;

use crate::{PasswordError, TokenValidationError};

/// Authentication failures. Every variant surfaces as 401 at the HTTP edge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("This account has been deactivated")]
    Deactivated,

    #[error("You are not logged in. Please log in to get access")]
    MissingToken,

    #[error("Invalid token. Please log in again")]
    InvalidToken,

    #[error("Your token has expired. Please log in again")]
    Expired,

    #[error("The user belonging to this token no longer exists")]
    UnknownSubject,

    #[error("User recently changed password. Please log in again")]
    CredentialsChanged,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<TokenValidationError> for AuthError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => AuthError::Expired,
            TokenValidationError::CredentialsChanged => AuthError::CredentialsChanged,
            TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                AuthError::InvalidToken
            }
        }
    }
}

impl AuthError {
    /// Whether the failure is the caller's fault (as opposed to a server fault).
    pub fn is_operational(&self) -> bool {
        !matches!(self, AuthError::Signing(_) | AuthError::Password(_))
    }
}
