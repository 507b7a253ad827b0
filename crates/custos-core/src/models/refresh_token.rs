//! Refresh token domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest user agent string kept on a refresh token.
pub const MAX_USER_AGENT_LEN: usize = 256;

/// A server-side refresh token record.
///
/// Only the SHA-256 hash of the raw secret is stored. Tokens created by
/// rotating one another share a `family`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once, never cleared.
    pub revoked_at: Option<DateTime<Utc>>,
    /// The token minted when this one was rotated.
    pub replaced_by: Option<Uuid>,
    pub family: Uuid,
    pub user_agent: String,
    pub ip_address: Option<String>,
}

impl RefreshToken {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Revoked because a successor was issued from it.
    pub fn is_superseded(&self) -> bool {
        self.replaced_by.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub family: Uuid,
    pub user_agent: String,
    pub ip_address: Option<String>,
}

/// Client metadata recorded alongside a refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub user_agent: String,
    pub ip_address: Option<String>,
}

impl ClientContext {
    pub fn new(user_agent: Option<&str>, ip_address: Option<String>) -> Self {
        let user_agent = user_agent
            .unwrap_or_default()
            .chars()
            .take(MAX_USER_AGENT_LEN)
            .collect();
        Self {
            user_agent,
            ip_address,
        }
    }
}
