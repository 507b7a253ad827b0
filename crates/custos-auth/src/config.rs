//! Authentication configuration.

use std::env;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::AuthError;

/// Minimum refresh-secret entropy (256 bits).
pub const MIN_REFRESH_TOKEN_ENTROPY_BYTES: usize = 32;

/// Configuration for the authentication core.
///
/// Immutable once handed to [`AuthService`](crate::AuthService).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret for access tokens.
    pub jwt_secret: String,
    /// Signing algorithm; only the HMAC family is accepted.
    pub jwt_algorithm: Algorithm,
    /// Access token lifetime in minutes (default: 60).
    pub access_token_ttl_minutes: i64,
    /// Refresh token lifetime in days (default: 14).
    pub refresh_token_ttl_days: i64,
    /// Random bytes per refresh secret (default: 32).
    pub refresh_token_entropy_bytes: usize,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_algorithm: Algorithm::HS256,
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 14,
            refresh_token_entropy_bytes: MIN_REFRESH_TOKEN_ENTROPY_BYTES,
            pepper: None,
        }
    }
}

impl AuthConfig {
    /// Build a config from the process environment, falling back to the
    /// defaults for unset variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `JWT_SECRET` | `jwt_secret` |
    /// | `JWT_ALG` | `jwt_algorithm` |
    /// | `JWT_EXPIRES_MIN` | `access_token_ttl_minutes` |
    /// | `REFRESH_TOKEN_DAYS` | `refresh_token_ttl_days` |
    /// | `REFRESH_TOKEN_BYTES` | `refresh_token_entropy_bytes` |
    /// | `PASSWORD_PEPPER` | `pepper` |
    pub fn from_env() -> Result<Self, AuthError> {
        let mut config = Self::default();

        if let Ok(secret) = env::var("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Ok(alg) = env::var("JWT_ALG") {
            config.jwt_algorithm = Algorithm::from_str(alg.trim())
                .map_err(|_| AuthError::Config(format!("unknown JWT_ALG: {alg}")))?;
        }
        if let Some(minutes) = parse_var("JWT_EXPIRES_MIN")? {
            config.access_token_ttl_minutes = minutes;
        }
        if let Some(days) = parse_var("REFRESH_TOKEN_DAYS")? {
            config.refresh_token_ttl_days = days;
        }
        if let Some(bytes) = parse_var("REFRESH_TOKEN_BYTES")? {
            config.refresh_token_entropy_bytes = bytes;
        }
        if let Ok(pepper) = env::var("PASSWORD_PEPPER") {
            config.pepper = (!pepper.is_empty()).then_some(pepper);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the core cannot operate safely with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt_secret must not be empty".into()));
        }
        if !is_hmac(self.jwt_algorithm) {
            return Err(AuthError::Config(format!(
                "{:?} is not a symmetric signing algorithm",
                self.jwt_algorithm
            )));
        }
        if self.access_token_ttl_minutes <= 0 {
            return Err(AuthError::Config(
                "access_token_ttl_minutes must be positive".into(),
            ));
        }
        if self.refresh_token_ttl_days <= 0 {
            return Err(AuthError::Config(
                "refresh_token_ttl_days must be positive".into(),
            ));
        }
        if self.refresh_token_entropy_bytes < MIN_REFRESH_TOKEN_ENTROPY_BYTES {
            return Err(AuthError::Config(format!(
                "refresh_token_entropy_bytes must be at least {MIN_REFRESH_TOKEN_ENTROPY_BYTES}"
            )));
        }
        Ok(())
    }
}

pub(crate) fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, AuthError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AuthError::Config(format!("{name} is not a valid number: {raw}"))),
        Err(_) => Ok(None),
    }
}
