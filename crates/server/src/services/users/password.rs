//! Password hashing and generated secrets.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use super::UserError;
use crate::config::HashingConfig;

/// Length of passwords generated by a reset.
pub const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Argon2id hasher with configured cost.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHashing {
    config: HashingConfig,
}

impl PasswordHashing {
    #[must_use]
    pub const fn new(config: HashingConfig) -> Self {
        Self { config }
    }

    fn argon2(&self) -> Result<Argon2<'static>, UserError> {
        let params = Params::new(
            self.config.memory_kib,
            self.config.iterations,
            self.config.parallelism,
            None,
        )
        .map_err(|_| UserError::PasswordHash)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns `UserError::PasswordHash` if the cost parameters are invalid.
    pub fn hash(&self, password: &str) -> Result<String, UserError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| UserError::PasswordHash)
    }

    /// Check a password against a stored hash.
    ///
    /// A wrong password is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `UserError::PasswordHash` if the stored hash cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, UserError> {
        let parsed = PasswordHash::new(hash).map_err(|_| UserError::PasswordHash)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(_) => Err(UserError::PasswordHash),
        }
    }
}

/// Random alphanumeric password from the thread-local CSPRNG.
#[must_use]
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Fresh single-use recovery code.
#[must_use]
pub fn generate_confirm_code() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashing = PasswordHashing::new(HashingConfig::minimal());
        let hash = hashing.hash("password123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hashing.verify("password123", &hash).unwrap());
        assert!(!hashing.verify("password124", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salt() {
        let hashing = PasswordHashing::new(HashingConfig::minimal());
        assert_ne!(
            hashing.hash("password123").unwrap(),
            hashing.hash("password123").unwrap()
        );
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let hashing = PasswordHashing::new(HashingConfig::minimal());
        assert!(matches!(
            hashing.verify("password123", "not-a-hash"),
            Err(UserError::PasswordHash)
        ));
    }

    #[test]
    fn test_generated_password_format() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn test_confirm_codes_are_unique() {
        let code = generate_confirm_code();
        assert_eq!(code.len(), 36);
        assert_ne!(code, generate_confirm_code());
    }
}
