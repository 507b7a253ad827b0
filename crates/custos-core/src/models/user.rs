//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored account. Authentication resolves it into an
/// [`Identity`](super::identity::Identity) for the lifetime of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Opaque password hash (Argon2id PHC string in the default setup).
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Already-hashed password; storage never sees the plaintext.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub is_superuser: bool,
}

impl CreateUser {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: String::new(),
            last_name: String::new(),
            patronymic: String::new(),
            is_superuser: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub patronymic: Option<String>,
    pub password_hash: Option<String>,
    /// `Some(false)` is the soft delete.
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}
