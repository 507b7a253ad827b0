//! Business element domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A protected resource category (e.g. `items`, `orders`).
///
/// Callers reference elements by `slug` only; the id is a storage detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessElement {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBusinessElement {
    pub slug: String,
    pub name: String,
    pub description: String,
}
