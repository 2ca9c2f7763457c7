use serde::{Deserialize, Serialize};

use lms_core::UserId;

use crate::Role;

/// The authenticated identity making a request.
///
/// Construction is decoupled from transport: the API derives it from a
/// validated token plus the current account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
