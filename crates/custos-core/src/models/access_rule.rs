//! Access rule domain model: one row of the permission matrix.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CustosError;

/// An operation a caller wants to perform on a business element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CustosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(CustosError::Validation {
                message: format!("unknown action: {other}"),
            }),
        }
    }
}

/// Grant for one (role, business element) pair.
///
/// The seven flags are independent. The plain flags (`read`, `update`,
/// `delete`) only cover resources owned by the requester; the `_all`
/// variants cover every resource of the element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRule {
    pub id: Uuid,
    pub role_id: Uuid,
    pub element_id: Uuid,
    pub read: bool,
    pub read_all: bool,
    pub create: bool,
    pub update: bool,
    pub update_all: bool,
    pub delete: bool,
    pub delete_all: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRule {
    /// Whether this single rule lets `requester` perform `action` on a
    /// resource owned by `owner`.
    ///
    /// An absent owner never satisfies an own-resource flag.
    pub fn grants(&self, action: Action, requester: Uuid, owner: Option<Uuid>) -> bool {
        let owns = owner == Some(requester);
        match action {
            Action::Read => self.read_all || (self.read && owns),
            Action::Create => self.create,
            Action::Update => self.update_all || (self.update && owns),
            Action::Delete => self.delete_all || (self.delete && owns),
        }
    }
}

/// Input for creating or replacing the rule of a (role, element) pair.
/// Flags left at their default deny.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpsertAccessRule {
    pub role_id: Uuid,
    pub element_id: Uuid,
    pub read: bool,
    pub read_all: bool,
    pub create: bool,
    pub update: bool,
    pub update_all: bool,
    pub delete: bool,
    pub delete_all: bool,
}

impl UpsertAccessRule {
    /// Every flag set.
    pub fn full(role_id: Uuid, element_id: Uuid) -> Self {
        Self {
            role_id,
            element_id,
            read: true,
            read_all: true,
            create: true,
            update: true,
            update_all: true,
            delete: true,
            delete_all: true,
        }
    }

    /// Materialize the stored row for this input.
    pub fn into_rule(self, id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> AccessRule {
        AccessRule {
            id,
            role_id: self.role_id,
            element_id: self.element_id,
            read: self.read,
            read_all: self.read_all,
            create: self.create,
            update: self.update,
            update_all: self.update_all,
            delete: self.delete,
            delete_all: self.delete_all,
            created_at,
            updated_at,
        }
    }
}
