//! Role-based permission evaluation over the (role, element) matrix.
//!
//! Rules are unordered, independent grants combined with OR: one
//! granting rule is enough, and the absence of rules denies.

use custos_core::models::access_rule::{AccessRule, Action};
use custos_core::models::identity::Identity;
use custos_core::repository::AccessRuleRepository;
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthResult;

/// Monotone OR over `rules`. An empty slice denies.
pub fn decide(rules: &[AccessRule], action: Action, requester: Uuid, owner: Option<Uuid>) -> bool {
    rules
        .iter()
        .any(|rule| rule.grants(action, requester, owner))
}

/// Loads the rules relevant to a request and decides on them.
///
/// Only reachable through [`AuthorizationGate`](crate::gate::AuthorizationGate).
#[derive(Debug, Clone)]
pub(crate) struct PermissionEvaluator<A> {
    rules: A,
}

impl<A: AccessRuleRepository> PermissionEvaluator<A> {
    pub(crate) fn new(rules: A) -> Self {
        Self { rules }
    }

    pub(crate) fn repository(&self) -> &A {
        &self.rules
    }

    /// Inactive identities are denied and superusers allowed before any
    /// rule is loaded.
    pub(crate) async fn evaluate(
        &self,
        identity: &Identity,
        element_slug: &str,
        action: Action,
        owner: Option<Uuid>,
    ) -> AuthResult<bool> {
        if !identity.is_active {
            return Ok(false);
        }
        if identity.is_superuser {
            return Ok(true);
        }
        let role_ids: Vec<Uuid> = identity.role_ids.iter().copied().collect();
        self.evaluate_roles(&role_ids, element_slug, action, identity.id, owner)
            .await
    }

    pub(crate) async fn evaluate_roles(
        &self,
        role_ids: &[Uuid],
        element_slug: &str,
        action: Action,
        requester: Uuid,
        owner: Option<Uuid>,
    ) -> AuthResult<bool> {
        if role_ids.is_empty() {
            return Ok(false);
        }

        let rules = self.rules.list_for_roles(role_ids, element_slug).await?;
        if rules.is_empty() {
            debug!(element = element_slug, %action, "No access rules configured");
            return Ok(false);
        }

        Ok(decide(&rules, action, requester, owner))
    }
}
