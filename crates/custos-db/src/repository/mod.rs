//! SurrealDB repository implementations.

mod access_rule;
mod business_element;
mod refresh_token;
mod role;
mod user;

pub use access_rule::SurrealAccessRuleRepository;
pub use business_element::SurrealBusinessElementRepository;
pub use refresh_token::SurrealRefreshTokenRepository;
pub use role::SurrealRoleRepository;
pub use user::SurrealUserRepository;

use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

/// Attempts per operation before a write conflict is surfaced.
const WRITE_CONFLICT_ATTEMPTS: u32 = 5;

/// Parse a UUID column stored as a string.
fn parse_uuid(column: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {column} UUID: {e}")))
}

/// Run `op` again while it fails with a write conflict, up to
/// [`WRITE_CONFLICT_ATTEMPTS`] times. `op` must be safe to repeat: every
/// write it issues is guarded or transactional.
async fn retry_on_write_conflict<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_write_conflict() && attempt < WRITE_CONFLICT_ATTEMPTS => {
                debug!(attempt, "Write conflict, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}
