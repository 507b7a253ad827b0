//! Error types for the Custos storage-facing layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustosError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// A conditional write lost against a concurrent writer (or the row
    /// no longer satisfied its guard).
    #[error("Conflicting update on {entity} with id {id}")]
    Conflict { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CustosError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type CustosResult<T> = Result<T, CustosError>;
