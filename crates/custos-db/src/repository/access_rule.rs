//! SurrealDB implementation of [`AccessRuleRepository`].
//!
//! Flags are stored as `<flag>_permission` columns.

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::access_rule::{AccessRule, UpsertAccessRule};
use custos_core::repository::AccessRuleRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{parse_uuid, retry_on_write_conflict};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RuleRowWithId {
    record_id: String,
    role_id: String,
    element_id: String,
    read_permission: bool,
    read_all_permission: bool,
    create_permission: bool,
    update_permission: bool,
    update_all_permission: bool,
    delete_permission: bool,
    delete_all_permission: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuleRowWithId {
    fn try_into_rule(self) -> Result<AccessRule, DbError> {
        Ok(AccessRule {
            id: parse_uuid("access_rule", &self.record_id)?,
            role_id: parse_uuid("role", &self.role_id)?,
            element_id: parse_uuid("business_element", &self.element_id)?,
            read: self.read_permission,
            read_all: self.read_all_permission,
            create: self.create_permission,
            update: self.update_permission,
            update_all: self.update_all_permission,
            delete: self.delete_permission,
            delete_all: self.delete_all_permission,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

const RULE_FLAGS_SET: &str = "\
    read_permission = $read, \
    read_all_permission = $read_all, \
    create_permission = $create, \
    update_permission = $update, \
    update_all_permission = $update_all, \
    delete_permission = $delete, \
    delete_all_permission = $delete_all";

/// SurrealDB implementation of the AccessRule repository.
#[derive(Clone)]
pub struct SurrealAccessRuleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccessRuleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, role_id: Uuid, element_id: Uuid) -> Result<Option<AccessRule>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM access_rule \
                 WHERE role_id = $role_id AND element_id = $element_id",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("element_id", element_id.to_string()))
            .await?;

        let rows: Vec<RuleRowWithId> = result.take(0)?;
        rows.into_iter().next().map(|r| r.try_into_rule()).transpose()
    }

    async fn require_record(&self, table: &'static str, id: Uuid) -> Result<(), DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM type::record($table, $id)")
            .bind(("table", table))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<IdRow> = result.take(0)?;
        if rows.is_empty() {
            return Err(DbError::not_found(table, id));
        }
        Ok(())
    }

    /// Update the rule for the pair if one exists, create it otherwise.
    async fn write(&self, input: &UpsertAccessRule) -> Result<Uuid, DbError> {
        let (query, id) = match self.find(input.role_id, input.element_id).await? {
            Some(existing) => (
                format!(
                    "UPDATE type::record('access_rule', $id) SET {RULE_FLAGS_SET}, \
                     updated_at = time::now()"
                ),
                existing.id,
            ),
            None => (
                format!(
                    "CREATE type::record('access_rule', $id) SET \
                     role_id = $role_id, element_id = $element_id, {RULE_FLAGS_SET}"
                ),
                Uuid::new_v4(),
            ),
        };

        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("role_id", input.role_id.to_string()))
            .bind(("element_id", input.element_id.to_string()))
            .bind(("read", input.read))
            .bind(("read_all", input.read_all))
            .bind(("create", input.create))
            .bind(("update", input.update))
            .bind(("update_all", input.update_all))
            .bind(("delete", input.delete))
            .bind(("delete_all", input.delete_all))
            .await?
            .check()
            .map_err(|e| DbError::from_statement("access_rule", e))?;

        Ok(id)
    }
}

impl<C: Connection> AccessRuleRepository for SurrealAccessRuleRepository<C> {
    async fn upsert(&self, input: UpsertAccessRule) -> CustosResult<AccessRule> {
        self.require_record("role", input.role_id).await?;
        self.require_record("business_element", input.element_id).await?;

        // A concurrent creator of the same pair trips the unique index;
        // the second attempt finds its rule and updates it instead.
        let id = match retry_on_write_conflict(|| self.write(&input)).await {
            Err(DbError::Duplicate { .. }) => {
                debug!(
                    role_id = %input.role_id,
                    element_id = %input.element_id,
                    "Rule created concurrently, updating"
                );
                retry_on_write_conflict(|| self.write(&input)).await?
            }
            other => other?,
        };

        self.find(input.role_id, input.element_id)
            .await?
            .ok_or_else(|| DbError::not_found("access_rule", id).into())
    }

    async fn get(&self, role_id: Uuid, element_id: Uuid) -> CustosResult<AccessRule> {
        self.find(role_id, element_id)
            .await?
            .ok_or_else(|| DbError::not_found("access_rule", format!("{role_id}/{element_id}")).into())
    }

    async fn delete(&self, role_id: Uuid, element_id: Uuid) -> CustosResult<()> {
        let rule = self.get(role_id, element_id).await?;

        self.db
            .query("DELETE type::record('access_rule', $id)")
            .bind(("id", rule.id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_for_roles(
        &self,
        role_ids: &[Uuid],
        element_slug: &str,
    ) -> CustosResult<Vec<AccessRule>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM business_element WHERE slug = $slug")
            .bind(("slug", element_slug.to_string()))
            .await
            .map_err(DbError::from)?;
        let elements: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let Some(element) = elements.into_iter().next() else {
            return Ok(Vec::new());
        };

        let role_ids: Vec<String> = role_ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM access_rule \
                 WHERE element_id = $element_id AND role_id IN $role_ids",
            )
            .bind(("element_id", element.record_id))
            .bind(("role_ids", role_ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRowWithId> = result.take(0).map_err(DbError::from)?;
        let rules = rows
            .into_iter()
            .map(|row| row.try_into_rule())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(rules)
    }
}
