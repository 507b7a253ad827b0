//! Integration tests for the authentication service.

use chrono::{Duration, Utc};
use custos_auth::token::hash_refresh_secret;
use custos_auth::{
    Argon2Verifier, AuthConfig, AuthError, AuthService, LoginInput, Principal, RefreshInput,
    TokenCodec, TokenFailure, hash_password,
};
use custos_core::models::refresh_token::{ClientContext, CreateRefreshToken};
use custos_core::models::role::CreateRole;
use custos_core::models::user::{CreateUser, UpdateUser, User};
use custos_core::repository::{RefreshTokenRepository, RoleRepository, UserRepository};
use custos_db::repository::{
    SurrealRefreshTokenRepository, SurrealRoleRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

const PASSWORD: &str = "Passw0rd!";

type Service = AuthService<
    SurrealUserRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealRefreshTokenRepository<Db>,
    Argon2Verifier,
>;

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret".into(),
        ..Default::default()
    }
}

/// Spin up in-memory DB, run migrations, create one `user`-role account.
async fn setup() -> (Service, SurrealUserRepository<Db>, User) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    custos_db::run_migrations(&db).await.unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db.clone());

    let user = users
        .create(CreateUser::new(
            "alice@example.com",
            hash_password(PASSWORD, None).unwrap(),
        ))
        .await
        .unwrap();
    let role = roles
        .create(CreateRole {
            name: "user".into(),
        })
        .await
        .unwrap();
    roles.assign_to_user(user.id, role.id).await.unwrap();

    let service = AuthService::new(
        users.clone(),
        roles,
        SurrealRefreshTokenRepository::new(db),
        Argon2Verifier::default(),
        test_config(),
    )
    .unwrap();

    (service, users, user)
}

/// Same algorithm, different secret.
fn foreign_codec() -> TokenCodec {
    TokenCodec::new(&AuthConfig {
        jwt_secret: "some-other-secret".into(),
        ..Default::default()
    })
    .unwrap()
}

fn client() -> ClientContext {
    ClientContext::new(Some("IntegrationTest/1.0"), Some("127.0.0.1".into()))
}

fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        email: email.into(),
        password: password.into(),
        client: client(),
    }
}

fn refresh_input(raw: &str) -> RefreshInput {
    RefreshInput {
        raw_refresh_token: raw.into(),
        client: client(),
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn login_issues_tokens_that_resolve() {
    let (service, _, user) = setup().await;

    let output = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(output.identity.id, user.id);
    assert_eq!(output.expires_in, 3600);
    assert!(!output.refresh_token.is_empty());

    let principal = service
        .resolve(Some(&bearer(&output.access_token)))
        .await
        .unwrap();
    let identity = principal.identity().unwrap();
    assert_eq!(identity.id, user.id);
    assert_eq!(identity.email, "alice@example.com");
    assert!(identity.role_names.contains("user"));
    assert!(!identity.is_admin());
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let (service, _, _) = setup().await;

    let wrong_password = service
        .login(login_input("alice@example.com", "nope"))
        .await
        .unwrap_err();
    let unknown_email = service
        .login(login_input("mallory@example.com", PASSWORD))
        .await
        .unwrap_err();
    let wrong_case = service
        .login(login_input("Alice@example.com", PASSWORD))
        .await
        .unwrap_err();

    for err in [&wrong_password, &unknown_email, &wrong_case] {
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), wrong_password.to_string());
    }
}

#[tokio::test]
async fn anonymous_for_missing_or_bad_credentials() {
    let (service, _, user) = setup().await;

    let foreign = foreign_codec().issue(user.id).unwrap();
    let expired = service
        .codec()
        .issue_at(user.id, Utc::now() - Duration::hours(2))
        .unwrap();
    let ghost = service.codec().issue(Uuid::new_v4()).unwrap();

    let headers = [
        None,
        Some(String::new()),
        Some("Basic YWxpY2U6cHc=".to_string()),
        Some("Bearer".to_string()),
        Some("Bearer not.a.jwt".to_string()),
        Some(bearer(&foreign)),
        Some(bearer(&expired)),
        Some(bearer(&ghost)),
    ];
    for header in headers {
        let principal = service.resolve(header.as_deref()).await.unwrap();
        assert_eq!(principal, Principal::Anonymous, "header: {header:?}");

        let err = service
            .require_identity(header.as_deref())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }
}

#[tokio::test]
async fn deactivated_user_loses_access() {
    let (service, users, user) = setup().await;
    let output = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();

    users
        .update(
            user.id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let principal = service
        .resolve(Some(&bearer(&output.access_token)))
        .await
        .unwrap();
    assert!(principal.is_anonymous());

    let err = service
        .refresh(refresh_input(&output.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefresh));

    let record = service
        .refresh_tokens()
        .lookup(&output.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(!record.is_active());

    let err = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let (service, _, user) = setup().await;
    let login = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();

    let rotated = service
        .refresh(refresh_input(&login.refresh_token))
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, login.refresh_token);

    let principal = service
        .resolve(Some(&bearer(&rotated.access_token)))
        .await
        .unwrap();
    assert_eq!(principal.identity().map(|i| i.id), Some(user.id));

    let old = service
        .refresh_tokens()
        .lookup(&login.refresh_token)
        .await
        .unwrap()
        .unwrap();
    let new = service
        .refresh_tokens()
        .lookup(&rotated.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(!old.is_active());
    assert_eq!(old.replaced_by, Some(new.id));
    assert_eq!(old.family, new.family);
    assert_eq!(new.user_agent, "IntegrationTest/1.0");
}

#[tokio::test]
async fn replaying_a_rotated_token_revokes_the_family() {
    let (service, _, _) = setup().await;
    let login = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();
    let rotated = service
        .refresh(refresh_input(&login.refresh_token))
        .await
        .unwrap();

    let err = service
        .refresh(refresh_input(&login.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefresh));

    // The legitimate successor is gone too.
    let err = service
        .refresh(refresh_input(&rotated.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefresh));
}

#[tokio::test]
async fn unknown_and_expired_refresh_tokens_are_rejected() {
    let (service, _, user) = setup().await;

    for raw in ["", "   ", "never-issued"] {
        let err = service.refresh(refresh_input(raw)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefresh));
    }

    service
        .refresh_tokens()
        .repository()
        .create(CreateRefreshToken {
            user_id: user.id,
            token_hash: hash_refresh_secret("stale-secret"),
            expires_at: Utc::now() - Duration::minutes(1),
            family: Uuid::new_v4(),
            user_agent: String::new(),
            ip_address: None,
        })
        .await
        .unwrap();
    let err = service
        .refresh(refresh_input("stale-secret"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefresh));
}

#[tokio::test]
async fn logout_revokes_once() {
    let (service, _, _) = setup().await;
    let login = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();

    assert!(service.logout(&login.refresh_token).await.unwrap());
    assert!(!service.logout(&login.refresh_token).await.unwrap());
    assert!(!service.logout("never-issued").await.unwrap());

    let err = service
        .refresh(refresh_input(&login.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefresh));
}

#[tokio::test]
async fn logout_everywhere_revokes_every_session() {
    let (service, _, user) = setup().await;
    let first = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();
    let second = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();

    assert_eq!(service.logout_everywhere(user.id).await.unwrap(), 2);
    for raw in [&first.refresh_token, &second.refresh_token] {
        assert!(service.refresh(refresh_input(raw)).await.is_err());
    }
}

#[tokio::test]
async fn inspect_names_the_failed_check() {
    let (service, _, user) = setup().await;
    let token = service.codec().issue(user.id).unwrap();

    let ok = service.inspect(Some(&bearer(&token)));
    assert!(ok.ok);
    assert_eq!(ok.algorithm, "HS256");
    assert_eq!(ok.claims.unwrap().subject_id(), Some(user.id));

    let expired = service
        .codec()
        .issue_at(user.id, Utc::now() - Duration::hours(2))
        .unwrap();
    let report = service.inspect(Some(&bearer(&expired)));
    assert_eq!(report.failure, Some(TokenFailure::Expired));

    let forged = foreign_codec().issue(user.id).unwrap();
    let report = service.inspect(Some(&bearer(&forged)));
    assert_eq!(report.failure, Some(TokenFailure::BadSignature));

    let report = service.inspect(None);
    assert_eq!(report.failure, Some(TokenFailure::Malformed));
}
