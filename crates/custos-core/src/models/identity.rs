//! Resolved principal for one request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::user::User;

/// An authenticated principal, loaded fresh for each request and never
/// cached beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub role_ids: BTreeSet<Uuid>,
    pub role_names: BTreeSet<String>,
}

impl Identity {
    pub fn from_user(user: &User, roles: &[Role]) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            role_ids: roles.iter().map(|r| r.id).collect(),
            role_names: roles.iter().map(|r| r.name.clone()).collect(),
        }
    }

    /// Superusers and holders of a role named `admin` (any case).
    pub fn is_admin(&self) -> bool {
        self.is_superuser
            || self
                .role_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case("admin"))
    }
}
