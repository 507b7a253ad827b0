//! Database-specific error types and conversions.

use custos_core::error::CustosError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Duplicate { entity: String },

    #[error("Guarded update did not apply to {entity} with id {id}")]
    Conflict { entity: String, id: String },
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Classify a failed statement. SurrealDB reports unique index
    /// violations as "... already contains ...".
    pub(crate) fn from_statement(entity: &str, err: impl ToString) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            Self::Duplicate {
                entity: entity.into(),
            }
        } else {
            Self::Query(message)
        }
    }

    /// SurrealDB's optimistic transactions abort the later of two
    /// overlapping writers with "Transaction conflict ... retry the
    /// transaction". The statement did not apply and may be re-run.
    pub fn is_write_conflict(&self) -> bool {
        match self {
            Self::Surreal(_) | Self::Query(_) => {
                let message = self.to_string();
                message.contains("Transaction conflict") || message.contains("retry the transaction")
            }
            _ => false,
        }
    }
}

impl From<DbError> for CustosError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CustosError::NotFound { entity, id },
            DbError::Duplicate { entity } => CustosError::AlreadyExists { entity },
            DbError::Conflict { entity, id } => CustosError::Conflict { entity, id },
            other => CustosError::Database(other.to_string()),
        }
    }
}
