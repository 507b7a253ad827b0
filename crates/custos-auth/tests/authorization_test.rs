//! Request-level authorization: bearer header in, decision out.

use custos_auth::{
    Argon2Verifier, AuthConfig, AuthError, AuthService, AuthorizationGate, Decision, ReadScope,
    hash_password,
};
use custos_core::models::access_rule::{Action, UpsertAccessRule};
use custos_core::models::business_element::CreateBusinessElement;
use custos_core::models::role::CreateRole;
use custos_core::models::user::{CreateUser, User};
use custos_core::repository::{
    AccessRuleRepository, BusinessElementRepository, RoleRepository, UserRepository,
};
use custos_db::MemoryStore;
use uuid::Uuid;

type Service = AuthService<MemoryStore, MemoryStore, MemoryStore, Argon2Verifier>;

struct Fixture {
    service: Service,
    gate: AuthorizationGate<MemoryStore>,
    store: MemoryStore,
}

impl Fixture {
    async fn new() -> Self {
        let store = MemoryStore::new();
        let items = BusinessElementRepository::create(
            &store,
            CreateBusinessElement {
                slug: "items".into(),
                name: "Items".into(),
                description: String::new(),
            },
        )
        .await
        .unwrap();

        let grants = [
            (
                "manager",
                UpsertAccessRule {
                    read_all: true,
                    create: true,
                    update_all: true,
                    ..Default::default()
                },
            ),
            (
                "user",
                UpsertAccessRule {
                    read: true,
                    create: true,
                    update: true,
                    delete: true,
                    ..Default::default()
                },
            ),
            ("guest", UpsertAccessRule::default()),
        ];
        for (name, flags) in grants {
            let role = RoleRepository::create(&store, CreateRole { name: name.into() })
                .await
                .unwrap();
            store
                .upsert(UpsertAccessRule {
                    role_id: role.id,
                    element_id: items.id,
                    ..flags
                })
                .await
                .unwrap();
        }

        let config = AuthConfig {
            jwt_secret: "gate-test-secret".into(),
            ..Default::default()
        };
        let service = AuthService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Argon2Verifier::default(),
            config,
        )
        .unwrap();

        Self {
            service,
            gate: AuthorizationGate::new(store.clone()),
            store,
        }
    }

    async fn account(&self, email: &str, roles: &[&str], superuser: bool) -> User {
        let user = UserRepository::create(
            &self.store,
            CreateUser {
                is_superuser: superuser,
                ..CreateUser::new(email, hash_password("pw", None).unwrap())
            },
        )
        .await
        .unwrap();
        for name in roles {
            let role = self.store.get_by_name(name).await.unwrap();
            self.store.assign_to_user(user.id, role.id).await.unwrap();
        }
        user
    }

    fn header(&self, user: &User) -> String {
        format!("Bearer {}", self.service.codec().issue(user.id).unwrap())
    }

    async fn decide(
        &self,
        user: &User,
        action: Action,
        owner: Option<Uuid>,
    ) -> Decision {
        let principal = self.service.resolve(Some(&self.header(user))).await.unwrap();
        self.gate
            .authorize(&principal, "items", action, owner)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn manager_reads_everything_but_deletes_nothing() {
    let fx = Fixture::new().await;
    let manager = fx.account("manager@example.com", &["manager"], false).await;
    let other = Some(Uuid::new_v4());

    assert_eq!(fx.decide(&manager, Action::Read, other).await, Decision::Allow);
    assert_eq!(fx.decide(&manager, Action::Read, None).await, Decision::Allow);
    assert_eq!(fx.decide(&manager, Action::Update, other).await, Decision::Allow);
    assert_eq!(fx.decide(&manager, Action::Delete, other).await, Decision::Deny);
    assert_eq!(
        fx.decide(&manager, Action::Delete, Some(manager.id)).await,
        Decision::Deny
    );
}

#[tokio::test]
async fn user_touches_only_own_items() {
    let fx = Fixture::new().await;
    let bob = fx.account("bob@example.com", &["user"], false).await;
    let other = Some(Uuid::new_v4());

    for action in [Action::Read, Action::Update, Action::Delete] {
        assert_eq!(fx.decide(&bob, action, Some(bob.id)).await, Decision::Allow);
        assert_eq!(fx.decide(&bob, action, other).await, Decision::Deny);
        assert_eq!(fx.decide(&bob, action, None).await, Decision::Deny);
    }
    assert_eq!(fx.decide(&bob, Action::Create, None).await, Decision::Allow);
}

#[tokio::test]
async fn roles_combine_as_a_union() {
    let fx = Fixture::new().await;
    let both = fx.account("both@example.com", &["guest", "user"], false).await;
    let guest = fx.account("guest@example.com", &["guest"], false).await;

    assert_eq!(
        fx.decide(&both, Action::Update, Some(both.id)).await,
        Decision::Allow
    );
    assert_eq!(
        fx.decide(&guest, Action::Read, Some(guest.id)).await,
        Decision::Deny
    );
}

#[tokio::test]
async fn superuser_passes_without_rules() {
    let fx = Fixture::new().await;
    let root = fx.account("root@example.com", &[], true).await;

    for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
        assert_eq!(fx.decide(&root, action, Some(Uuid::new_v4())).await, Decision::Allow);
    }
    let principal = fx.service.resolve(Some(&fx.header(&root))).await.unwrap();
    let allowed = fx
        .gate
        .authorize(&principal, "no-such-element", Action::Delete, None)
        .await
        .unwrap();
    assert_eq!(allowed, Decision::Allow);
}

#[tokio::test]
async fn unknown_element_denies_everyone_else() {
    let fx = Fixture::new().await;
    let manager = fx.account("manager@example.com", &["manager"], false).await;
    let principal = fx.service.resolve(Some(&fx.header(&manager))).await.unwrap();

    let decision = fx
        .gate
        .authorize(&principal, "no-such-element", Action::Read, None)
        .await
        .unwrap();
    assert_eq!(decision, Decision::Deny);
}

#[tokio::test]
async fn missing_header_is_unauthenticated_not_forbidden() {
    let fx = Fixture::new().await;
    let principal = fx.service.resolve(None).await.unwrap();

    let err = fx
        .gate
        .require(&principal, "items", Action::Read, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));

    let bob = fx.account("bob@example.com", &["user"], false).await;
    let principal = fx.service.resolve(Some(&fx.header(&bob))).await.unwrap();
    let err = fx
        .gate
        .require(&principal, "items", Action::Delete, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
}

#[tokio::test]
async fn listing_scope_follows_read_flags() {
    let fx = Fixture::new().await;
    let manager = fx.account("manager@example.com", &["manager"], false).await;
    let bob = fx.account("bob@example.com", &["user"], false).await;
    let guest = fx.account("guest@example.com", &["guest"], false).await;

    let cases = [
        (&manager, ReadScope::All),
        (&bob, ReadScope::Own),
        (&guest, ReadScope::None),
    ];
    for (user, expected) in cases {
        let identity = fx
            .service
            .require_identity(Some(&fx.header(user)))
            .await
            .unwrap();
        assert_eq!(fx.gate.read_scope(&identity, "items").await.unwrap(), expected);
    }
}

#[tokio::test]
async fn rule_changes_apply_to_the_next_request() {
    let fx = Fixture::new().await;
    let guest = fx.account("guest@example.com", &["guest"], false).await;
    assert_eq!(fx.decide(&guest, Action::Create, None).await, Decision::Deny);

    let role = fx.store.get_by_name("guest").await.unwrap();
    let items = fx.store.get_by_slug("items").await.unwrap();
    fx.store
        .upsert(UpsertAccessRule {
            role_id: role.id,
            element_id: items.id,
            create: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(fx.decide(&guest, Action::Create, None).await, Decision::Allow);
}

#[tokio::test]
async fn admin_guard_accepts_superusers_and_admin_role() {
    let fx = Fixture::new().await;
    RoleRepository::create(&fx.store, CreateRole { name: "Admin".into() })
        .await
        .unwrap();
    let root = fx.account("root@example.com", &[], true).await;
    let admin = fx.account("admin@example.com", &["Admin"], false).await;
    let bob = fx.account("bob@example.com", &["user"], false).await;

    for user in [&root, &admin] {
        let principal = fx.service.resolve(Some(&fx.header(user))).await.unwrap();
        assert!(fx.gate.require_admin(&principal).is_ok());
    }
    let principal = fx.service.resolve(Some(&fx.header(&bob))).await.unwrap();
    assert!(matches!(
        fx.gate.require_admin(&principal),
        Err(AuthError::Forbidden)
    ));
}
