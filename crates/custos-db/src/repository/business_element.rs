//! SurrealDB implementation of [`BusinessElementRepository`].

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::business_element::{BusinessElement, CreateBusinessElement};
use custos_core::repository::BusinessElementRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ElementRow {
    slug: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl ElementRow {
    fn into_element(self, id: Uuid) -> BusinessElement {
        BusinessElement {
            id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct ElementRowWithId {
    record_id: String,
    slug: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl ElementRowWithId {
    fn try_into_element(self) -> Result<BusinessElement, DbError> {
        Ok(BusinessElement {
            id: parse_uuid("business_element", &self.record_id)?,
            slug: self.slug,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the BusinessElement repository.
#[derive(Clone)]
pub struct SurrealBusinessElementRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBusinessElementRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BusinessElementRepository for SurrealBusinessElementRepository<C> {
    async fn create(&self, input: CreateBusinessElement) -> CustosResult<BusinessElement> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('business_element', $id) SET \
                 slug = $slug, name = $name, description = $description",
            )
            .bind(("id", id_str.clone()))
            .bind(("slug", input.slug))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("business_element", e))?;

        let rows: Vec<ElementRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("business_element", id_str))?;

        Ok(row.into_element(id))
    }

    async fn get_by_slug(&self, slug: &str) -> CustosResult<BusinessElement> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM business_element \
                 WHERE slug = $slug",
            )
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ElementRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("business_element", format!("slug={slug}")))?;

        Ok(row.try_into_element()?)
    }

    async fn list(&self) -> CustosResult<Vec<BusinessElement>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM business_element \
                 ORDER BY slug ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ElementRowWithId> = result.take(0).map_err(DbError::from)?;
        let elements = rows
            .into_iter()
            .map(|row| row.try_into_element())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(elements)
    }

    async fn delete(&self, id: Uuid) -> CustosResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('business_element', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ElementRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("business_element", id_str).into());
        }

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE access_rule WHERE element_id = $id; \
                 DELETE type::record('business_element', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }
}
