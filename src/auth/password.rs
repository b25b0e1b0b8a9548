//! Password hashing (argon2) for the single panel operator.

use crate::error::{PanelError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString, rand_core::OsRng},
};

/// Shortest password a login attempt may carry.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Holds the configured password as an argon2 hash, computed once at startup.
#[derive(Clone)]
pub struct PasswordVerifier {
    hash: String,
}

impl PasswordVerifier {
    /// Accepts either a PHC string (`$argon2id$...`) or a plaintext password,
    /// which is hashed here.
    pub fn from_configured(configured: &str) -> Result<Self> {
        if configured.starts_with("$argon2") {
            PasswordHash::new(configured).map_err(|e| PanelError::Settings(format!("auth.password is not a valid argon2 hash: {e}")))?;
            return Ok(Self { hash: configured.to_string() });
        }
        Ok(Self { hash: hash_password(configured)? })
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_password(password, &self.hash)
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PanelError::internal(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
}
