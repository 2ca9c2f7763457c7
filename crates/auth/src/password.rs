//! Salted, deliberately slow password hashing (Argon2id).

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("invalid hash parameters: {0}")]
    Params(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Work factor for [`CredentialHasher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
        }
    }
}

/// Hashes and verifies account passwords.
///
/// Verification against an unknown account still burns one full hash
/// computation (see [`CredentialHasher::verify_absent`]) so that response time
/// does not reveal whether an email is registered.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    decoy_hash: String,
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Result<Self, PasswordError> {
        let params = Params::new(cost.memory_kib, cost.iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;

        let mut hasher = Self {
            params,
            decoy_hash: String::new(),
        };
        hasher.decoy_hash = hasher.hash("decoy-password-never-matches")?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Produce a PHC-format hash with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Constant-time verification. Malformed stored hashes never match.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Spend the same effort as [`Self::verify`] when no account matched.
    pub fn verify_absent(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.decoy_hash);
        false
    }
}

impl core::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::new(HashCost {
            memory_kib: 1024,
            iterations: 1,
        })
        .unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let h = cheap();
        let stored = h.hash("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(h.verify("correct horse", &stored));
        assert!(!h.verify("wrong horse", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        let h = cheap();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!cheap().verify("anything", "not-a-phc-string"));
    }

    #[test]
    fn absent_account_never_matches() {
        assert!(!cheap().verify_absent("decoy-password-never-matches"));
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = CredentialHasher::new(HashCost {
            memory_kib: 1024,
            iterations: 0,
        })
        .unwrap_err();
        assert!(matches!(err, PasswordError::Params(_)));
    }
}
