//! Authentication and authorization outcomes.
//!
//! Display strings never say which sub-check failed or which rule was
//! missing.

use custos_core::error::CustosError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Access token malformed, wrongly signed or expired.
    #[error("invalid token")]
    InvalidToken,

    /// A credential was required and none (or no valid one) was given.
    #[error("authentication required")]
    Unauthenticated,

    /// Login failed. Unknown account and wrong password look the same.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Refresh secret unknown, expired or revoked.
    #[error("invalid refresh token")]
    InvalidRefresh,

    /// Authenticated, but the permission matrix denies the request.
    #[error("forbidden")]
    Forbidden,

    /// Rotation attempted on a refresh token that is no longer active.
    #[error("refresh token is no longer active")]
    AlreadyInactive,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] CustosError),
}

impl AuthError {
    /// Outcomes a transport should report as "unauthenticated".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken
                | AuthError::Unauthenticated
                | AuthError::InvalidCredentials
                | AuthError::InvalidRefresh
                | AuthError::AlreadyInactive
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
