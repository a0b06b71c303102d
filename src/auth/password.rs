use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::thread_rng;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// The stored digest is not a PHC string.
    #[error("malformed password hash: {0}")]
    Format(String),
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| PasswordError::Hashing(err.to_string()))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|err| PasswordError::Format(err.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
