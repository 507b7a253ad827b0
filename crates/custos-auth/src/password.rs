//! Password verification capability.
//!
//! The core only ever asks "does this plaintext match that stored
//! hash?". [`Argon2Verifier`] is the default answer.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier as _};

use crate::error::AuthError;

/// Opaque `verify(password, hash) -> bool` capability.
pub trait PasswordVerifier: Send + Sync {
    /// `Ok(true)` on match, `Ok(false)` on mismatch, `Err` when the stored
    /// hash cannot be interpreted.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id verifier for PHC-format hashes, with an optional pepper.
#[derive(Debug, Clone, Default)]
pub struct Argon2Verifier {
    pepper: Option<String>,
}

impl Argon2Verifier {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }
}

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        verify_password(password, hash, self.pepper.as_deref())
    }
}

fn peppered(password: &str, pepper: Option<&str>) -> String {
    match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_owned(),
    }
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// If `pepper` is provided it is prepended to the password before
/// verification; it must match the pepper used during hashing.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, AuthError> {
    let input = peppered(password, pepper);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Hash a password with Argon2id (m=19456 KiB, t=2, p=1) and a fresh
/// random salt.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let input = peppered(password, pepper);
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(Argon2Verifier::default().verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(!Argon2Verifier::default().verify("wrong", &hash).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("hunter2", Some("pepper!")).unwrap();
        let peppered = Argon2Verifier::new(Some("pepper!".into()));
        assert!(peppered.verify("hunter2", &hash).unwrap());
        // Without pepper should fail.
        assert!(!Argon2Verifier::default().verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        let result = verify_password("pw", "not-a-hash", None);
        assert!(matches!(result, Err(AuthError::Crypto(_))));
    }
}
