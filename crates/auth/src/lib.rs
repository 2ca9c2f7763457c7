//! `lms-auth` — authentication and authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: decisions are
//! pure functions over a [`Principal`] and facts the caller has already
//! resolved (ownership chain, enrollment).

pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{
    AccessFacts, Action, AuthzError, Decision, OwnershipChain, authorize_enrollment,
    authorize_mutation, authorize_provisioning, decide, decide_anonymous_read,
};
pub use claims::{JwtClaims, TokenValidationError, ensure_issued_after_password_change, validate_claims};
pub use error::AuthError;
pub use password::{CredentialHasher, HashCost, PasswordError};
pub use principal::Principal;
pub use roles::Role;
pub use token::{Hs256TokenService, IssuedToken, TokenService};
pub use user::{NewUser, User, UserProfile};
