//! Password hashing via bcrypt.

use sha2::{Digest, Sha256};

use super::{AuthError, AuthResult};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Short digest of a stored password hash, embedded in reset tokens.
///
/// bcrypt salts every hash, so the stamp changes on every password change,
/// including a change back to the same password.
pub fn password_stamp(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    format!("{digest:x}")[..32].to_string()
}

/// Reject passwords shorter than [`MIN_PASSWORD_LENGTH`].
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
