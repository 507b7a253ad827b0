//! Request authorization gate: the single entry point for
//! allow/deny decisions.

use custos_core::models::access_rule::Action;
use custos_core::models::identity::Identity;
use custos_core::repository::AccessRuleRepository;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::permission::PermissionEvaluator;
use crate::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Which resources of an element an identity may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    All,
    Own,
    None,
}

/// Composes authentication results with the permission evaluator.
#[derive(Debug, Clone)]
pub struct AuthorizationGate<A> {
    evaluator: PermissionEvaluator<A>,
}

impl<A: AccessRuleRepository> AuthorizationGate<A> {
    pub fn new(rules: A) -> Self {
        Self {
            evaluator: PermissionEvaluator::new(rules),
        }
    }

    pub fn rules(&self) -> &A {
        self.evaluator.repository()
    }

    /// Decide whether `principal` may perform `action` on a resource of
    /// `element_slug` owned by `owner`. Anonymous principals are denied.
    pub async fn authorize(
        &self,
        principal: &Principal,
        element_slug: &str,
        action: Action,
        owner: Option<Uuid>,
    ) -> AuthResult<Decision> {
        let Some(identity) = principal.identity() else {
            debug!(element = element_slug, %action, "Denied anonymous principal");
            return Ok(Decision::Deny);
        };

        let decision: Decision = self
            .evaluator
            .evaluate(identity, element_slug, action, owner)
            .await?
            .into();

        debug!(
            user_id = %identity.id,
            element = element_slug,
            %action,
            ?decision,
            "Authorization decision"
        );
        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize), but as an error:
    /// [`AuthError::Unauthenticated`] for anonymous principals and
    /// [`AuthError::Forbidden`] for a denial.
    pub async fn require(
        &self,
        principal: &Principal,
        element_slug: &str,
        action: Action,
        owner: Option<Uuid>,
    ) -> AuthResult<()> {
        if principal.is_anonymous() {
            return Err(AuthError::Unauthenticated);
        }
        match self.authorize(principal, element_slug, action, owner).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                if let Some(identity) = principal.identity() {
                    info!(user_id = %identity.id, element = element_slug, %action, "Forbidden");
                }
                Err(AuthError::Forbidden)
            }
        }
    }

    /// Read scope for listing an element: every resource (`read_all`),
    /// only the identity's own resources (`read`), or none.
    pub async fn read_scope(&self, identity: &Identity, element_slug: &str) -> AuthResult<ReadScope> {
        if self
            .evaluator
            .evaluate(identity, element_slug, Action::Read, None)
            .await?
        {
            return Ok(ReadScope::All);
        }
        if self
            .evaluator
            .evaluate(identity, element_slug, Action::Read, Some(identity.id))
            .await?
        {
            return Ok(ReadScope::Own);
        }
        Ok(ReadScope::None)
    }

    /// Guard for administrative management of roles, elements and rules.
    pub fn require_admin(&self, principal: &Principal) -> AuthResult<()> {
        match principal.identity() {
            None => Err(AuthError::Unauthenticated),
            Some(identity) if identity.is_active && identity.is_admin() => Ok(()),
            Some(_) => Err(AuthError::Forbidden),
        }
    }
}
