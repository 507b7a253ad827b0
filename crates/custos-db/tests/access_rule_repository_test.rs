//! Integration tests for roles, business elements and access rules
//! using in-memory SurrealDB.

use custos_core::error::CustosError;
use custos_core::models::access_rule::{Action, UpsertAccessRule};
use custos_core::models::business_element::{BusinessElement, CreateBusinessElement};
use custos_core::models::role::{CreateRole, Role};
use custos_core::models::user::CreateUser;
use custos_core::repository::{
    AccessRuleRepository, BusinessElementRepository, RoleRepository, UserRepository,
};
use custos_db::repository::{
    SurrealAccessRuleRepository, SurrealBusinessElementRepository, SurrealRoleRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Repos {
    users: SurrealUserRepository<Db>,
    roles: SurrealRoleRepository<Db>,
    elements: SurrealBusinessElementRepository<Db>,
    rules: SurrealAccessRuleRepository<Db>,
}

async fn setup() -> Repos {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    custos_db::run_migrations(&db).await.unwrap();
    Repos {
        users: SurrealUserRepository::new(db.clone()),
        roles: SurrealRoleRepository::new(db.clone()),
        elements: SurrealBusinessElementRepository::new(db.clone()),
        rules: SurrealAccessRuleRepository::new(db),
    }
}

async fn role(repos: &Repos, name: &str) -> Role {
    repos
        .roles
        .create(CreateRole { name: name.into() })
        .await
        .unwrap()
}

async fn element(repos: &Repos, slug: &str) -> BusinessElement {
    repos
        .elements
        .create(CreateBusinessElement {
            slug: slug.into(),
            name: slug.to_uppercase(),
            description: String::new(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn role_names_are_unique_and_case_sensitive() {
    let repos = setup().await;
    let admin = role(&repos, "admin").await;

    let err = repos
        .roles
        .create(CreateRole {
            name: "admin".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CustosError::AlreadyExists { .. }));

    role(&repos, "Admin").await;
    assert_eq!(repos.roles.get_by_name("admin").await.unwrap().id, admin.id);
    assert_eq!(repos.roles.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn assignments_are_idempotent() {
    let repos = setup().await;
    let user = repos
        .users
        .create(CreateUser::new("u@example.com", "h"))
        .await
        .unwrap();
    let manager = role(&repos, "manager").await;
    let viewer = role(&repos, "viewer").await;

    repos.roles.assign_to_user(user.id, manager.id).await.unwrap();
    repos.roles.assign_to_user(user.id, manager.id).await.unwrap();
    repos.roles.assign_to_user(user.id, viewer.id).await.unwrap();

    let names: Vec<String> = repos
        .roles
        .get_user_roles(user.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["manager", "viewer"]);

    repos.roles.unassign_from_user(user.id, viewer.id).await.unwrap();
    assert_eq!(repos.roles.get_user_roles(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn assigning_to_unknown_user_fails() {
    let repos = setup().await;
    let manager = role(&repos, "manager").await;
    let err = repos
        .roles
        .assign_to_user(Uuid::new_v4(), manager.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn upsert_replaces_all_flags() {
    let repos = setup().await;
    let manager = role(&repos, "manager").await;
    let items = element(&repos, "items").await;

    let first = repos
        .rules
        .upsert(UpsertAccessRule::full(manager.id, items.id))
        .await
        .unwrap();
    assert!(first.delete_all);

    let second = repos
        .rules
        .upsert(UpsertAccessRule {
            role_id: manager.id,
            element_id: items.id,
            read_all: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert!(second.read_all);
    assert!(!second.read && !second.create && !second.delete_all);

    let stored = repos.rules.get(manager.id, items.id).await.unwrap();
    assert_eq!(stored, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_converge_on_one_rule() {
    let repos = setup().await;
    let manager = role(&repos, "manager").await;
    let items = element(&repos, "items").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let rules = repos.rules.clone();
        let input = UpsertAccessRule {
            role_id: manager.id,
            element_id: items.id,
            read_all: true,
            ..Default::default()
        };
        handles.push(tokio::spawn(async move { rules.upsert(input).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let rule = handle.await.unwrap().unwrap();
        assert!(rule.read_all);
        ids.push(rule.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let stored = repos
        .rules
        .list_for_roles(&[manager.id], "items")
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, ids[0]);
}

#[tokio::test]
async fn upsert_requires_existing_role_and_element() {
    let repos = setup().await;
    let items = element(&repos, "items").await;

    let err = repos
        .rules
        .upsert(UpsertAccessRule {
            role_id: Uuid::new_v4(),
            element_id: items.id,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_for_roles_filters_by_role_and_slug() {
    let repos = setup().await;
    let manager = role(&repos, "manager").await;
    let user = role(&repos, "user").await;
    let guest = role(&repos, "guest").await;
    let items = element(&repos, "items").await;
    let orders = element(&repos, "orders").await;

    for (role_id, element_id) in [(manager.id, items.id), (user.id, items.id), (manager.id, orders.id)] {
        repos
            .rules
            .upsert(UpsertAccessRule {
                role_id,
                element_id,
                read: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let rules = repos
        .rules
        .list_for_roles(&[user.id, guest.id], "items")
        .await
        .unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].role_id, user.id);
    assert!(rules[0].grants(Action::Read, Uuid::nil(), Some(Uuid::nil())));

    let rules = repos
        .rules
        .list_for_roles(&[manager.id, user.id], "items")
        .await
        .unwrap();
    assert_eq!(rules.len(), 2);

    assert!(
        repos
            .rules
            .list_for_roles(&[manager.id], "no-such-element")
            .await
            .unwrap()
            .is_empty()
    );
    assert!(repos.rules.list_for_roles(&[], "items").await.unwrap().is_empty());
}

#[tokio::test]
async fn deletes_cascade_to_rules() {
    let repos = setup().await;
    let manager = role(&repos, "manager").await;
    let user = role(&repos, "user").await;
    let items = element(&repos, "items").await;
    let orders = element(&repos, "orders").await;
    for (role_id, element_id) in [(manager.id, items.id), (user.id, orders.id)] {
        repos
            .rules
            .upsert(UpsertAccessRule::full(role_id, element_id))
            .await
            .unwrap();
    }

    repos.roles.delete(manager.id).await.unwrap();
    assert!(repos.rules.get(manager.id, items.id).await.unwrap_err().is_not_found());

    repos.elements.delete(orders.id).await.unwrap();
    assert!(repos.rules.get(user.id, orders.id).await.unwrap_err().is_not_found());
    assert!(repos.elements.get_by_slug("orders").await.unwrap_err().is_not_found());

    assert!(repos.roles.delete(manager.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn element_slugs_are_unique() {
    let repos = setup().await;
    element(&repos, "items").await;
    let err = repos
        .elements
        .create(CreateBusinessElement {
            slug: "items".into(),
            name: "Other".into(),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CustosError::AlreadyExists { .. }));

    element(&repos, "orders").await;
    let slugs: Vec<String> = repos
        .elements
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.slug)
        .collect();
    assert_eq!(slugs, ["items", "orders"]);
}
