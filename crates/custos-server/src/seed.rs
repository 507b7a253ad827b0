//! Demo data: four roles, four business elements, the rule matrix
//! between them and two accounts.

use custos_auth::hash_password;
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::access_rule::UpsertAccessRule;
use custos_core::models::business_element::{BusinessElement, CreateBusinessElement};
use custos_core::models::role::{CreateRole, Role};
use custos_core::models::user::{CreateUser, User};
use custos_core::repository::{
    AccessRuleRepository, BusinessElementRepository, RoleRepository, UserRepository,
};
use tracing::info;

pub const DEMO_PASSWORD: &str = "Passw0rd!";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "bob@example.com";

const ROLES: [&str; 4] = ["admin", "manager", "user", "guest"];
const ELEMENTS: [(&str, &str); 4] = [
    ("items", "Items"),
    ("users", "Users"),
    ("orders", "Orders"),
    ("rules", "Access Rules"),
];

/// What the seed left in place.
#[derive(Debug)]
pub struct SeedSummary {
    pub roles: Vec<Role>,
    pub elements: Vec<BusinessElement>,
    pub admin: User,
    pub user: User,
}

/// Grants per (role, element). Pairs not listed have no rule.
fn matrix(role: &str, element: &str) -> Option<UpsertAccessRule> {
    let flags = match (role, element) {
        ("admin", _) => UpsertAccessRule::full(Default::default(), Default::default()),
        ("manager", "items") => UpsertAccessRule {
            read_all: true,
            create: true,
            update_all: true,
            ..Default::default()
        },
        ("manager", "orders") => UpsertAccessRule {
            read_all: true,
            ..Default::default()
        },
        ("user", "items") => UpsertAccessRule {
            read: true,
            create: true,
            update: true,
            delete: true,
            ..Default::default()
        },
        ("user", "users") => UpsertAccessRule {
            read: true,
            ..Default::default()
        },
        _ => return None,
    };
    Some(flags)
}

/// Idempotent: roles, elements and accounts are looked up before being
/// created, and rules that already exist keep their flags.
pub async fn seed_demo<U, R, E, A>(
    users: &U,
    roles: &R,
    elements: &E,
    rules: &A,
    pepper: Option<&str>,
) -> CustosResult<SeedSummary>
where
    U: UserRepository,
    R: RoleRepository,
    E: BusinessElementRepository,
    A: AccessRuleRepository,
{
    let mut seeded_roles = Vec::with_capacity(ROLES.len());
    for name in ROLES {
        seeded_roles.push(role(roles, name).await?);
    }

    let mut seeded_elements = Vec::with_capacity(ELEMENTS.len());
    for (slug, name) in ELEMENTS {
        seeded_elements.push(element(elements, slug, name).await?);
    }

    for role in &seeded_roles {
        for element in &seeded_elements {
            let Some(flags) = matrix(&role.name, &element.slug) else {
                continue;
            };
            match rules.get(role.id, element.id).await {
                Ok(_) => continue,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            rules
                .upsert(UpsertAccessRule {
                    role_id: role.id,
                    element_id: element.id,
                    ..flags
                })
                .await?;
        }
    }

    let admin = account(users, ADMIN_EMAIL, "Admin", true, pepper).await?;
    let user = account(users, USER_EMAIL, "Bob", false, pepper).await?;
    roles.assign_to_user(admin.id, role_id(&seeded_roles, "admin")?).await?;
    roles.assign_to_user(user.id, role_id(&seeded_roles, "user")?).await?;

    info!(
        roles = seeded_roles.len(),
        elements = seeded_elements.len(),
        "Demo data seeded"
    );

    Ok(SeedSummary {
        roles: seeded_roles,
        elements: seeded_elements,
        admin,
        user,
    })
}

async fn role<R: RoleRepository>(roles: &R, name: &str) -> CustosResult<Role> {
    match roles.get_by_name(name).await {
        Err(e) if e.is_not_found() => roles.create(CreateRole { name: name.into() }).await,
        other => other,
    }
}

async fn element<E: BusinessElementRepository>(
    elements: &E,
    slug: &str,
    name: &str,
) -> CustosResult<BusinessElement> {
    match elements.get_by_slug(slug).await {
        Err(e) if e.is_not_found() => {
            elements
                .create(CreateBusinessElement {
                    slug: slug.into(),
                    name: name.into(),
                    description: String::new(),
                })
                .await
        }
        other => other,
    }
}

async fn account<U: UserRepository>(
    users: &U,
    email: &str,
    first_name: &str,
    is_superuser: bool,
    pepper: Option<&str>,
) -> CustosResult<User> {
    match users.get_by_email(email).await {
        Err(e) if e.is_not_found() => {
            let password_hash = hash_password(DEMO_PASSWORD, pepper)
                .map_err(|e| CustosError::Crypto(e.to_string()))?;
            users
                .create(CreateUser {
                    first_name: first_name.into(),
                    is_superuser,
                    ..CreateUser::new(email, password_hash)
                })
                .await
        }
        other => other,
    }
}

fn role_id(roles: &[Role], name: &str) -> CustosResult<uuid::Uuid> {
    roles
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.id)
        .ok_or_else(|| CustosError::not_found("role", format!("name={name}")))
}
