//! Password hashing via bcrypt.

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Check a password against an optional stored hash.
///
/// Accounts without a usable password (social-only users) never match.
pub fn check_password(password: &str, hash: Option<&str>) -> Result<(), AuthError> {
    let Some(hash) = hash.filter(|h| !h.is_empty()) else {
        return Err(AuthError::CredentialError);
    };
    match bcrypt::verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::CredentialError),
        Err(e) => Err(AuthError::Internal(format!("bcrypt verify: {e}"))),
    }
}
