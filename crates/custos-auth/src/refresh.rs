//! Rotating, revocable refresh tokens.
//!
//! Raw secrets are handed out exactly once, at issuance; storage only
//! ever sees their SHA-256 hash. Each rotation revokes the presented
//! token and mints its successor in the same family.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use custos_core::error::CustosError;
use custos_core::models::refresh_token::{ClientContext, CreateRefreshToken, RefreshToken};
use custos_core::repository::RefreshTokenRepository;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::{generate_refresh_secret, hash_refresh_secret};

/// A freshly issued refresh token: the raw secret for the client and
/// the stored record.
pub struct IssuedRefreshToken {
    pub secret: String,
    pub record: RefreshToken,
}

impl fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("secret", &"<redacted>")
            .field("record", &self.record)
            .finish()
    }
}

/// Refresh token lifecycle on top of a [`RefreshTokenRepository`].
#[derive(Debug, Clone)]
pub struct RefreshTokenStore<S> {
    repo: S,
    ttl: Duration,
    entropy_bytes: usize,
}

impl<S: RefreshTokenRepository> RefreshTokenStore<S> {
    pub fn new(repo: S, config: &AuthConfig) -> Self {
        Self {
            repo,
            ttl: Duration::days(config.refresh_token_ttl_days),
            entropy_bytes: config.refresh_token_entropy_bytes,
        }
    }

    pub fn repository(&self) -> &S {
        &self.repo
    }

    fn new_record(
        &self,
        user_id: Uuid,
        client: &ClientContext,
        family: Uuid,
        now: DateTime<Utc>,
    ) -> (String, CreateRefreshToken) {
        let secret = generate_refresh_secret(self.entropy_bytes);
        let input = CreateRefreshToken {
            user_id,
            token_hash: hash_refresh_secret(&secret),
            expires_at: now + self.ttl,
            family,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
        };
        (secret, input)
    }

    /// Issue a token for `user_id`, continuing `family` or starting a new one.
    pub async fn issue(
        &self,
        user_id: Uuid,
        client: &ClientContext,
        family: Option<Uuid>,
    ) -> AuthResult<IssuedRefreshToken> {
        let family = family.unwrap_or_else(Uuid::new_v4);
        let (secret, input) = self.new_record(user_id, client, family, Utc::now());
        let record = self.repo.create(input).await?;

        debug!(user_id = %user_id, family = %family, token_id = %record.id, "Issued refresh token");
        Ok(IssuedRefreshToken { secret, record })
    }

    /// Exact-match lookup by hash. Callers must treat `None` and an
    /// inactive record the same way.
    pub async fn lookup(&self, raw_secret: &str) -> AuthResult<Option<RefreshToken>> {
        if raw_secret.is_empty() {
            return Ok(None);
        }
        match self
            .repo
            .get_by_token_hash(&hash_refresh_secret(raw_secret))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke a token. Revoking an already revoked token changes nothing.
    pub async fn revoke(&self, record: &RefreshToken) -> AuthResult<bool> {
        let revoked = self.repo.revoke(record.id, Utc::now()).await?;
        if revoked {
            debug!(token_id = %record.id, family = %record.family, "Revoked refresh token");
        }
        Ok(revoked)
    }

    /// Revoke `record` and issue its successor in the same family.
    ///
    /// Fails with [`AuthError::AlreadyInactive`] if `record` is expired,
    /// revoked, or was rotated concurrently by another caller.
    pub async fn rotate(
        &self,
        record: &RefreshToken,
        client: &ClientContext,
    ) -> AuthResult<IssuedRefreshToken> {
        let now = Utc::now();
        if !record.is_active_at(now) {
            return Err(AuthError::AlreadyInactive);
        }

        let (secret, input) = self.new_record(record.user_id, client, record.family, now);
        let successor = self
            .repo
            .rotate(record.id, now, input)
            .await
            .map_err(|e| match e {
                CustosError::Conflict { .. } => AuthError::AlreadyInactive,
                other => other.into(),
            })?;

        info!(
            user_id = %record.user_id,
            family = %record.family,
            old_token_id = %record.id,
            new_token_id = %successor.id,
            "Rotated refresh token"
        );
        Ok(IssuedRefreshToken {
            secret,
            record: successor,
        })
    }

    pub async fn revoke_family(&self, family: Uuid) -> AuthResult<u64> {
        Ok(self.repo.revoke_family(family, Utc::now()).await?)
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.repo.revoke_all_for_user(user_id, Utc::now()).await?)
    }
}
