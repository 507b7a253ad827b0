//! In-process implementation of every repository trait.
//!
//! All state lives behind one mutex, so each operation (including
//! refresh token rotation) is atomic with respect to every other.
//! Uniqueness constraints mirror the SurrealDB schema.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::access_rule::{AccessRule, UpsertAccessRule};
use custos_core::models::business_element::{BusinessElement, CreateBusinessElement};
use custos_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use custos_core::models::role::{CreateRole, Role};
use custos_core::models::user::{CreateUser, UpdateUser, User};
use custos_core::repository::{
    AccessRuleRepository, BusinessElementRepository, RefreshTokenRepository, RoleRepository,
    UserRepository,
};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    /// (user_id, role_id)
    assignments: BTreeSet<(Uuid, Uuid)>,
    elements: HashMap<Uuid, BusinessElement>,
    /// Keyed by (role_id, element_id).
    rules: HashMap<(Uuid, Uuid), AccessRule>,
    /// Insertion order is creation order.
    tokens: Vec<RefreshToken>,
}

impl State {
    fn token_mut(&mut self, id: Uuid) -> CustosResult<&mut RefreshToken> {
        self.tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CustosError::not_found("refresh_token", id))
    }

    fn insert_token(&mut self, input: CreateRefreshToken, now: DateTime<Utc>) -> RefreshToken {
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            token_hash: input.token_hash,
            created_at: now,
            expires_at: input.expires_at,
            revoked_at: None,
            replaced_by: None,
            family: input.family,
            user_agent: input.user_agent,
            ip_address: input.ip_address,
        };
        self.tokens.push(token.clone());
        token
    }

    fn hash_taken(&self, token_hash: &str) -> bool {
        self.tokens.iter().any(|t| t.token_hash == token_hash)
    }

    fn revoke_where(&mut self, at: DateTime<Utc>, pred: impl Fn(&RefreshToken) -> bool) -> u64 {
        let mut revoked = 0;
        for token in self.tokens.iter_mut().filter(|t| pred(t)) {
            if token.revoked_at.is_none() {
                token.revoked_at = Some(at);
                revoked += 1;
            }
        }
        revoked
    }
}

/// Cloneable handle; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn already_exists(entity: &str) -> CustosError {
    CustosError::AlreadyExists {
        entity: entity.into(),
    }
}

impl UserRepository for MemoryStore {
    async fn create(&self, input: CreateUser) -> CustosResult<User> {
        let mut state = self.state.lock();
        if state.users.values().any(|u| u.email == input.email) {
            return Err(already_exists("user"));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            patronymic: input.patronymic,
            is_active: true,
            is_superuser: input.is_superuser,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<User> {
        self.state
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| CustosError::not_found("user", id))
    }

    async fn get_by_email(&self, email: &str) -> CustosResult<User> {
        self.state
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| CustosError::not_found("user", format!("email={email}")))
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> CustosResult<User> {
        let mut state = self.state.lock();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| CustosError::not_found("user", id))?;

        if let Some(first_name) = input.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name;
        }
        if let Some(patronymic) = input.patronymic {
            user.patronymic = patronymic;
        }
        if let Some(password_hash) = input.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = input.is_superuser {
            user.is_superuser = is_superuser;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

impl RoleRepository for MemoryStore {
    async fn create(&self, input: CreateRole) -> CustosResult<Role> {
        let mut state = self.state.lock();
        if state.roles.values().any(|r| r.name == input.name) {
            return Err(already_exists("role"));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: Utc::now(),
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<Role> {
        self.state
            .lock()
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| CustosError::not_found("role", id))
    }

    async fn get_by_name(&self, name: &str) -> CustosResult<Role> {
        self.state
            .lock()
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| CustosError::not_found("role", format!("name={name}")))
    }

    async fn delete(&self, id: Uuid) -> CustosResult<()> {
        let mut state = self.state.lock();
        if state.roles.remove(&id).is_none() {
            return Err(CustosError::not_found("role", id));
        }
        state.assignments.retain(|&(_, role_id)| role_id != id);
        state.rules.retain(|&(role_id, _), _| role_id != id);
        Ok(())
    }

    async fn list(&self) -> CustosResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.state.lock().roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn assign_to_user(&self, user_id: Uuid, role_id: Uuid) -> CustosResult<()> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&user_id) {
            return Err(CustosError::not_found("user", user_id));
        }
        if !state.roles.contains_key(&role_id) {
            return Err(CustosError::not_found("role", role_id));
        }
        state.assignments.insert((user_id, role_id));
        Ok(())
    }

    async fn unassign_from_user(&self, user_id: Uuid, role_id: Uuid) -> CustosResult<()> {
        self.state.lock().assignments.remove(&(user_id, role_id));
        Ok(())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> CustosResult<Vec<Role>> {
        let state = self.state.lock();
        let mut roles: Vec<Role> = state
            .assignments
            .range((user_id, Uuid::nil())..=(user_id, Uuid::from_u128(u128::MAX)))
            .filter_map(|(_, role_id)| state.roles.get(role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

impl BusinessElementRepository for MemoryStore {
    async fn create(&self, input: CreateBusinessElement) -> CustosResult<BusinessElement> {
        let mut state = self.state.lock();
        if state.elements.values().any(|e| e.slug == input.slug) {
            return Err(already_exists("business_element"));
        }
        let element = BusinessElement {
            id: Uuid::new_v4(),
            slug: input.slug,
            name: input.name,
            description: input.description,
            created_at: Utc::now(),
        };
        state.elements.insert(element.id, element.clone());
        Ok(element)
    }

    async fn get_by_slug(&self, slug: &str) -> CustosResult<BusinessElement> {
        self.state
            .lock()
            .elements
            .values()
            .find(|e| e.slug == slug)
            .cloned()
            .ok_or_else(|| CustosError::not_found("business_element", format!("slug={slug}")))
    }

    async fn list(&self) -> CustosResult<Vec<BusinessElement>> {
        let mut elements: Vec<BusinessElement> =
            self.state.lock().elements.values().cloned().collect();
        elements.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(elements)
    }

    async fn delete(&self, id: Uuid) -> CustosResult<()> {
        let mut state = self.state.lock();
        if state.elements.remove(&id).is_none() {
            return Err(CustosError::not_found("business_element", id));
        }
        state.rules.retain(|&(_, element_id), _| element_id != id);
        Ok(())
    }
}

impl AccessRuleRepository for MemoryStore {
    async fn upsert(&self, input: UpsertAccessRule) -> CustosResult<AccessRule> {
        let mut state = self.state.lock();
        if !state.roles.contains_key(&input.role_id) {
            return Err(CustosError::not_found("role", input.role_id));
        }
        if !state.elements.contains_key(&input.element_id) {
            return Err(CustosError::not_found("business_element", input.element_id));
        }

        let key = (input.role_id, input.element_id);
        let now = Utc::now();
        let (id, created_at) = state
            .rules
            .get(&key)
            .map(|existing| (existing.id, existing.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), now));
        let rule = input.into_rule(id, created_at, now);
        state.rules.insert(key, rule.clone());
        Ok(rule)
    }

    async fn get(&self, role_id: Uuid, element_id: Uuid) -> CustosResult<AccessRule> {
        self.state
            .lock()
            .rules
            .get(&(role_id, element_id))
            .cloned()
            .ok_or_else(|| CustosError::not_found("access_rule", format!("{role_id}/{element_id}")))
    }

    async fn delete(&self, role_id: Uuid, element_id: Uuid) -> CustosResult<()> {
        self.state
            .lock()
            .rules
            .remove(&(role_id, element_id))
            .map(|_| ())
            .ok_or_else(|| CustosError::not_found("access_rule", format!("{role_id}/{element_id}")))
    }

    async fn list_for_roles(
        &self,
        role_ids: &[Uuid],
        element_slug: &str,
    ) -> CustosResult<Vec<AccessRule>> {
        let state = self.state.lock();
        let Some(element) = state.elements.values().find(|e| e.slug == element_slug) else {
            return Ok(Vec::new());
        };
        Ok(role_ids
            .iter()
            .filter_map(|role_id| state.rules.get(&(*role_id, element.id)).cloned())
            .collect())
    }
}

impl RefreshTokenRepository for MemoryStore {
    async fn create(&self, input: CreateRefreshToken) -> CustosResult<RefreshToken> {
        let mut state = self.state.lock();
        if state.hash_taken(&input.token_hash) {
            return Err(already_exists("refresh_token"));
        }
        Ok(state.insert_token(input, Utc::now()))
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<RefreshToken> {
        self.state
            .lock()
            .tokens
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CustosError::not_found("refresh_token", id))
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> CustosResult<RefreshToken> {
        self.state
            .lock()
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned()
            .ok_or_else(|| CustosError::not_found("refresh_token", "token_hash"))
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> CustosResult<bool> {
        let mut state = self.state.lock();
        let token = state.token_mut(id)?;
        if token.revoked_at.is_some() {
            return Ok(false);
        }
        token.revoked_at = Some(at);
        Ok(true)
    }

    async fn rotate(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        replacement: CreateRefreshToken,
    ) -> CustosResult<RefreshToken> {
        let mut state = self.state.lock();
        if !state.token_mut(id)?.is_active_at(now) {
            return Err(CustosError::Conflict {
                entity: "refresh_token".into(),
                id: id.to_string(),
            });
        }
        if state.hash_taken(&replacement.token_hash) {
            return Err(already_exists("refresh_token"));
        }

        let successor = state.insert_token(replacement, now);
        let old = state.token_mut(id)?;
        old.revoked_at = Some(now);
        old.replaced_by = Some(successor.id);
        Ok(successor)
    }

    async fn revoke_family(&self, family: Uuid, at: DateTime<Utc>) -> CustosResult<u64> {
        Ok(self.state.lock().revoke_where(at, |t| t.family == family))
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> CustosResult<u64> {
        Ok(self.state.lock().revoke_where(at, |t| t.user_id == user_id))
    }

    async fn list_family(&self, family: Uuid) -> CustosResult<Vec<RefreshToken>> {
        Ok(self
            .state
            .lock()
            .tokens
            .iter()
            .filter(|t| t.family == family)
            .cloned()
            .collect())
    }
}
