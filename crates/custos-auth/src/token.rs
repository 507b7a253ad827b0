//! JWT access token issuance/verification and opaque refresh secret
//! generation.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{AuthConfig, is_hmac};
use crate::error::AuthError;

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn subject_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Why verification failed. Only surfaced through [`TokenCodec::inspect_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFailure {
    Malformed,
    BadSignature,
    Expired,
}

/// Diagnostic view of a token, for operator tooling only.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInspection {
    pub ok: bool,
    pub algorithm: String,
    pub claims: Option<AccessTokenClaims>,
    pub failure: Option<TokenFailure>,
}

/// Signs and verifies access tokens with a shared HMAC secret.
///
/// Verification depends only on the token, the supplied `now`, the
/// secret and the algorithm.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt_secret must not be empty".into()));
        }
        if !is_hmac(config.jwt_algorithm) {
            return Err(AuthError::Config(format!(
                "{:?} is not a symmetric signing algorithm",
                config.jwt_algorithm
            )));
        }
        let secret = config.jwt_secret.as_bytes();
        Ok(Self {
            algorithm: config.jwt_algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(config.access_token_ttl_minutes),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Access token lifetime in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }

    /// Issue a signed access token for `user_id` as of `now`.
    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iat,
            exp: iat + self.ttl.num_seconds(),
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Verify signature and expiry. Every failure collapses to
    /// [`AuthError::InvalidToken`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessTokenClaims, AuthError> {
        self.decode_at(token, now).map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verbose verification that names the failed check.
    pub fn inspect_at(&self, token: &str, now: DateTime<Utc>) -> TokenInspection {
        let algorithm = format!("{:?}", self.algorithm);
        match self.decode_at(token, now) {
            Ok(claims) => TokenInspection {
                ok: true,
                algorithm,
                claims: Some(claims),
                failure: None,
            },
            Err(failure) => TokenInspection {
                ok: false,
                algorithm,
                claims: None,
                failure: Some(failure),
            },
        }
    }

    fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessTokenClaims, TokenFailure> {
        // Expiry is checked below against the caller's clock, with no leeway.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let claims = jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenFailure::BadSignature
                }
                ErrorKind::ExpiredSignature => TokenFailure::Expired,
                _ => TokenFailure::Malformed,
            })?;

        if now.timestamp() >= claims.exp {
            return Err(TokenFailure::Expired);
        }
        Ok(claims)
    }
}

/// Generate a random opaque refresh secret of `entropy_bytes` bytes,
/// base64url-encoded without padding.
pub fn generate_refresh_secret(entropy_bytes: usize) -> String {
    let mut bytes = vec![0u8; entropy_bytes];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh secret, hex-encoded.
///
/// This is the only form of the secret that is ever stored.
pub fn hash_refresh_secret(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shorten a token for log output.
pub(crate) fn redact(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 24 {
        let head: String = chars[..12].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "<short>".into()
    }
}
