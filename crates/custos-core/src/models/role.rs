//! Role domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    /// Unique, matched case-sensitively.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Whether this role confers administrative rights. The `admin`
    /// name is the one place roles are compared case-insensitively.
    pub fn is_admin(&self) -> bool {
        self.name.eq_ignore_ascii_case("admin")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
}
