//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Missing rows are reported as
//! [`CustosError::NotFound`](crate::error::CustosError::NotFound).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CustosResult;
use crate::models::{
    access_rule::{AccessRule, UpsertAccessRule},
    business_element::{BusinessElement, CreateBusinessElement},
    refresh_token::{CreateRefreshToken, RefreshToken},
    role::{CreateRole, Role},
    user::{CreateUser, UpdateUser, User},
};

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CustosResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CustosResult<User>> + Send;
    /// Exact, case-sensitive match on the stored email.
    fn get_by_email(&self, email: &str) -> impl Future<Output = CustosResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CustosResult<User>> + Send;
}

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = CustosResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CustosResult<Role>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = CustosResult<Role>> + Send;
    /// Deletes the role together with its access rules and assignments.
    fn delete(&self, id: Uuid) -> impl Future<Output = CustosResult<()>> + Send;
    fn list(&self) -> impl Future<Output = CustosResult<Vec<Role>>> + Send;

    /// Assign a role to a user. Assigning twice is a no-op.
    fn assign_to_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = CustosResult<()>> + Send;
    fn unassign_from_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = CustosResult<()>> + Send;
    fn get_user_roles(&self, user_id: Uuid) -> impl Future<Output = CustosResult<Vec<Role>>> + Send;
}

pub trait BusinessElementRepository: Send + Sync {
    fn create(
        &self,
        input: CreateBusinessElement,
    ) -> impl Future<Output = CustosResult<BusinessElement>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = CustosResult<BusinessElement>> + Send;
    fn list(&self) -> impl Future<Output = CustosResult<Vec<BusinessElement>>> + Send;
    /// Deletes the element together with every rule that references it.
    fn delete(&self, id: Uuid) -> impl Future<Output = CustosResult<()>> + Send;
}

pub trait AccessRuleRepository: Send + Sync {
    /// Create the rule for `(role_id, element_id)` or overwrite all seven
    /// flags of the existing one.
    fn upsert(
        &self,
        input: UpsertAccessRule,
    ) -> impl Future<Output = CustosResult<AccessRule>> + Send;
    fn get(
        &self,
        role_id: Uuid,
        element_id: Uuid,
    ) -> impl Future<Output = CustosResult<AccessRule>> + Send;
    fn delete(&self, role_id: Uuid, element_id: Uuid)
    -> impl Future<Output = CustosResult<()>> + Send;
    /// All rules held by any of `role_ids` on the element with `element_slug`.
    /// An unknown slug yields an empty list.
    fn list_for_roles(
        &self,
        role_ids: &[Uuid],
        element_slug: &str,
    ) -> impl Future<Output = CustosResult<Vec<AccessRule>>> + Send;
}

pub trait RefreshTokenRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = CustosResult<RefreshToken>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CustosResult<RefreshToken>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = CustosResult<RefreshToken>> + Send;

    /// Set `revoked_at = at` if it is still unset. Returns `true` when this
    /// call performed the revocation.
    fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> impl Future<Output = CustosResult<bool>> + Send;

    /// Atomically revoke the token `id` and create `replacement`, linking
    /// the old row to the new one through `replaced_by`.
    ///
    /// The revocation is conditional on the old row still being active at
    /// `now`; when it is not (including when a concurrent rotation won),
    /// nothing is written and [`CustosError::Conflict`] is returned.
    ///
    /// [`CustosError::Conflict`]: crate::error::CustosError::Conflict
    fn rotate(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        replacement: CreateRefreshToken,
    ) -> impl Future<Output = CustosResult<RefreshToken>> + Send;

    /// Revoke every still-unrevoked token of a family. Returns how many
    /// rows changed.
    fn revoke_family(
        &self,
        family: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = CustosResult<u64>> + Send;
    fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = CustosResult<u64>> + Send;
    /// Tokens of a family, oldest first.
    fn list_family(&self, family: Uuid) -> impl Future<Output = CustosResult<Vec<RefreshToken>>> + Send;
}
