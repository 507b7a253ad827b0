//! SurrealDB implementation of [`RoleRepository`].

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::role::{CreateRole, Role};
use custos_core::repository::RoleRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid("role", &self.record_id)?,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Role repository.
///
/// Assignments live in the `role_assignment` table keyed by
/// `(user_id, role_id)`.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn exists(&self, table: &'static str, id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record($table, $id) GROUP ALL")
            .bind(("table", table))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> CustosResult<Role> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query("CREATE type::record('role', $id) SET name = $name")
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id_str))?;

        Ok(Role {
            id,
            name: row.name,
            created_at: row.created_at,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('role', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id_str))?;

        Ok(Role {
            id,
            name: row.name,
            created_at: row.created_at,
        })
    }

    async fn get_by_name(&self, name: &str) -> CustosResult<Role> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM role WHERE name = $name")
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", format!("name={name}")))?;

        Ok(row.try_into_role()?)
    }

    async fn delete(&self, id: Uuid) -> CustosResult<()> {
        if !self.exists("role", id).await? {
            return Err(DbError::not_found("role", id).into());
        }

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE role_assignment WHERE role_id = $id; \
                 DELETE access_rule WHERE role_id = $id; \
                 DELETE type::record('role', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self) -> CustosResult<Vec<Role>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM role ORDER BY name ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(roles)
    }

    async fn assign_to_user(&self, user_id: Uuid, role_id: Uuid) -> CustosResult<()> {
        if !self.exists("user", user_id).await? {
            return Err(DbError::not_found("user", user_id).into());
        }
        if !self.exists("role", role_id).await? {
            return Err(DbError::not_found("role", role_id).into());
        }

        let result = self
            .db
            .query("CREATE role_assignment SET user_id = $user_id, role_id = $role_id")
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => Ok(()),
            Err(e) => match DbError::from_statement("role_assignment", e) {
                // Already assigned.
                DbError::Duplicate { .. } => Ok(()),
                other => Err(other.into()),
            },
        }
    }

    async fn unassign_from_user(&self, user_id: Uuid, role_id: Uuid) -> CustosResult<()> {
        self.db
            .query("DELETE role_assignment WHERE user_id = $user_id AND role_id = $role_id")
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> CustosResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE meta::id(id) IN (\
                     SELECT VALUE role_id FROM role_assignment \
                     WHERE user_id = $user_id\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(roles)
    }
}
