//! SurrealDB implementation of [`RefreshTokenRepository`].
//!
//! Rotation is one transaction. A conditional `UPDATE` that only matches
//! a still-active row revokes the old token and links its successor; the
//! successor is created only when that update matched. Overlapping
//! rotations abort with a write conflict and are re-run, at which point
//! the guard no longer matches.

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use custos_core::repository::RefreshTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use super::{parse_uuid, retry_on_write_conflict};
use crate::error::DbError;

const TOKEN_FIELDS_SET: &str = "\
    user_id = $user_id, \
    token_hash = $token_hash, \
    expires_at = $expires_at, \
    family = $family, \
    user_agent = $user_agent, \
    ip_address = $ip_address";

#[derive(Debug, SurrealValue)]
struct TokenRow {
    user_id: String,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    replaced_by: Option<String>,
    family: String,
    user_agent: String,
    ip_address: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct TokenRowWithId {
    record_id: String,
    user_id: String,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    replaced_by: Option<String>,
    family: String,
    user_agent: String,
    ip_address: Option<String>,
}

impl TokenRow {
    fn try_into_token(self, id: Uuid) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id,
            user_id: parse_uuid("user", &self.user_id)?,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            replaced_by: self
                .replaced_by
                .as_deref()
                .map(|s| parse_uuid("replaced_by", s))
                .transpose()?,
            family: parse_uuid("family", &self.family)?,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
        })
    }
}

impl TokenRowWithId {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        let id = parse_uuid("refresh_token", &self.record_id)?;
        TokenRow {
            user_id: self.user_id,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            replaced_by: self.replaced_by,
            family: self.family,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
        }
        .try_into_token(id)
    }
}

/// SurrealDB implementation of the RefreshToken repository.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn insert(&self, input: CreateRefreshToken) -> Result<RefreshToken, DbError> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('refresh_token', $id) SET {TOKEN_FIELDS_SET}"
            ))
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .bind(("family", input.family.to_string()))
            .bind(("user_agent", input.user_agent))
            .bind(("ip_address", input.ip_address))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        let rows: Vec<TokenRow> = result.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("refresh_token", &id_str))?;

        row.try_into_token(id)
    }

    /// `revoked_at = at` on `id` unless it is already revoked. Returns
    /// the rows that changed (zero or one).
    async fn revoke_unrevoked(&self, id: Uuid, at: DateTime<Utc>) -> Result<usize, DbError> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('refresh_token', $id) SET revoked_at = $at \
                 WHERE revoked_at = NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await?;

        let rows: Vec<TokenRow> = result.take(0)?;
        Ok(rows.len())
    }

    /// Revoke `id` and create `successor_id` from `replacement` in one
    /// transaction, or change nothing if `id` is not active at `now`.
    async fn rotate_tx(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        successor_id: Uuid,
        replacement: &CreateRefreshToken,
    ) -> Result<(), DbError> {
        let mut response = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $won = (UPDATE type::record('refresh_token', $id) \
                     SET revoked_at = $at, replaced_by = $successor \
                     WHERE revoked_at = NONE AND expires_at > $at); \
                 IF array::len($won) > 0 {{ \
                     CREATE type::record('refresh_token', $successor) SET {TOKEN_FIELDS_SET}; \
                 }}; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("id", id.to_string()))
            .bind(("at", now))
            .bind(("successor", successor_id.to_string()))
            .bind(("user_id", replacement.user_id.to_string()))
            .bind(("token_hash", replacement.token_hash.clone()))
            .bind(("expires_at", replacement.expires_at))
            .bind(("family", replacement.family.to_string()))
            .bind(("user_agent", replacement.user_agent.clone()))
            .bind(("ip_address", replacement.ip_address.clone()))
            .await?;

        // Inside a cancelled transaction every statement reports an error;
        // only one of them names the cause.
        let errors = response.take_errors();
        if errors.is_empty() {
            return Ok(());
        }
        let mut messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
        messages.sort();
        Err(DbError::from_statement("refresh_token", messages.join("; ")))
    }

    async fn find(&self, id: Uuid) -> Result<Option<RefreshToken>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('refresh_token', $id)")
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<TokenRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_token(id))
            .transpose()
    }

    async fn fetch(&self, id: Uuid) -> Result<RefreshToken, DbError> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("refresh_token", id))
    }

    async fn revoke_matching(
        &self,
        column: &'static str,
        value: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(format!(
                "UPDATE refresh_token SET revoked_at = $at \
                 WHERE {column} = $value AND revoked_at = NONE"
            ))
            .bind(("value", value.to_string()))
            .bind(("at", at))
            .await?;

        let rows: Vec<TokenRow> = result.take(0)?;
        Ok(rows.len() as u64)
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn create(&self, input: CreateRefreshToken) -> CustosResult<RefreshToken> {
        Ok(self.insert(input).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<RefreshToken> {
        Ok(self.fetch(id).await?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> CustosResult<RefreshToken> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        // Never echo the hash.
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("refresh_token", "token_hash"))?;

        Ok(row.try_into_token()?)
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> CustosResult<bool> {
        if retry_on_write_conflict(|| self.revoke_unrevoked(id, at)).await? > 0 {
            return Ok(true);
        }
        // Distinguish "already revoked" from "no such token".
        self.fetch(id).await?;
        Ok(false)
    }

    async fn rotate(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        replacement: CreateRefreshToken,
    ) -> CustosResult<RefreshToken> {
        let successor_id = Uuid::new_v4();
        let contended =
            match retry_on_write_conflict(|| self.rotate_tx(id, now, successor_id, &replacement))
                .await
            {
                Ok(()) => None,
                Err(e) if e.is_write_conflict() => Some(e),
                Err(e) => return Err(e.into()),
            };

        if let Some(successor) = self.find(successor_id).await? {
            return Ok(successor);
        }

        let current = self.fetch(id).await?;
        if let Some(e) = contended.filter(|_| current.is_active_at(now)) {
            warn!(token_id = %id, error = %e, "Refresh token rotation kept conflicting");
            return Err(e.into());
        }
        Err(DbError::Conflict {
            entity: "refresh_token".into(),
            id: id.to_string(),
        }
        .into())
    }

    async fn revoke_family(&self, family: Uuid, at: DateTime<Utc>) -> CustosResult<u64> {
        Ok(retry_on_write_conflict(|| self.revoke_matching("family", family, at)).await?)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> CustosResult<u64> {
        Ok(retry_on_write_conflict(|| self.revoke_matching("user_id", user_id, at)).await?)
    }

    async fn list_family(&self, family: Uuid) -> CustosResult<Vec<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE family = $family ORDER BY created_at ASC",
            )
            .bind(("family", family.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        let tokens = rows
            .into_iter()
            .map(|row| row.try_into_token())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(tokens)
    }
}
