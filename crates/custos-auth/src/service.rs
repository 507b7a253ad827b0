//! Authentication service: bearer resolution, login, refresh
//! rotation and logout orchestration.

use chrono::Utc;
use custos_core::models::identity::Identity;
use custos_core::models::refresh_token::ClientContext;
use custos_core::models::user::User;
use custos_core::repository::{RefreshTokenRepository, RoleRepository, UserRepository};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::password::PasswordVerifier;
use crate::principal::Principal;
use crate::refresh::RefreshTokenStore;
use crate::token::{TokenCodec, TokenInspection, redact};

/// Argon2id hash with the default cost parameters that no password
/// matches. Verified against when the email is unknown.
const UNKNOWN_ACCOUNT_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$oT8NJn6vJ9AGcVKdFK0Emg$ckHYRFjVGonKLd+9+9e22OBJfyYiWNUqQiRQB9u1gsI";

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub client: ClientContext,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token (return to client, not stored).
    pub refresh_token: String,
    pub identity: Identity,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Input for the refresh token rotation flow.
#[derive(Debug)]
pub struct RefreshInput {
    pub raw_refresh_token: String,
    pub client: ClientContext,
}

/// Successful refresh result (new token pair).
#[derive(Debug)]
pub struct RefreshOutput {
    /// New signed JWT access token.
    pub access_token: String,
    /// New opaque refresh token (replaces the consumed one).
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Extract the token from an `Authorization` header value.
///
/// The header must be exactly two whitespace-separated parts, the first
/// being `Bearer` in any case. Surrounding quotes around the token are
/// stripped. Anything else yields `None`.
pub fn parse_bearer(header: &str) -> Option<String> {
    let mut parts = header.split_whitespace();
    let (Some(scheme), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = strip_quotes(strip_quotes(raw.trim(), '"'), '\'').trim();
    (!token.is_empty()).then(|| token.to_owned())
}

fn strip_quotes(value: &str, quote: char) -> &str {
    value
        .strip_prefix(quote)
        .and_then(|v| v.strip_suffix(quote))
        .unwrap_or(value)
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U, R, S, P> {
    users: U,
    roles: R,
    refresh: RefreshTokenStore<S>,
    codec: TokenCodec,
    verifier: P,
}

impl<U, R, S, P> AuthService<U, R, S, P>
where
    U: UserRepository,
    R: RoleRepository,
    S: RefreshTokenRepository,
    P: PasswordVerifier,
{
    pub fn new(
        users: U,
        roles: R,
        refresh_tokens: S,
        verifier: P,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            users,
            roles,
            refresh: RefreshTokenStore::new(refresh_tokens, &config),
            codec: TokenCodec::new(&config)?,
            verifier,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore<S> {
        &self.refresh
    }

    /// Resolve an `Authorization` header into a principal.
    ///
    /// Missing, malformed or invalid credentials, unknown subjects and
    /// inactive accounts all resolve to [`Principal::Anonymous`]. Only
    /// storage failures are errors.
    pub async fn resolve(&self, authorization: Option<&str>) -> AuthResult<Principal> {
        let Some(header) = authorization else {
            debug!("No Authorization header");
            return Ok(Principal::Anonymous);
        };
        let Some(token) = parse_bearer(header) else {
            debug!("Authorization header is not a bearer credential");
            return Ok(Principal::Anonymous);
        };
        self.resolve_token(&token).await
    }

    /// Resolve a bare access token.
    pub async fn resolve_token(&self, token: &str) -> AuthResult<Principal> {
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(_) => {
                debug!(token = %redact(token), "Access token verification failed");
                return Ok(Principal::Anonymous);
            }
        };

        let Some(user_id) = claims.subject_id() else {
            debug!(sub = %claims.sub, "Access token subject is not a user id");
            return Ok(Principal::Anonymous);
        };

        match self.load_identity(user_id).await? {
            Some(identity) => Ok(Principal::Authenticated(identity)),
            None => {
                warn!(user_id = %user_id, "Valid access token but user not resolved");
                Ok(Principal::Anonymous)
            }
        }
    }

    /// For boundaries that demand authentication: anonymous becomes
    /// [`AuthError::Unauthenticated`].
    pub async fn require_identity(&self, authorization: Option<&str>) -> AuthResult<Identity> {
        self.resolve(authorization)
            .await?
            .into_identity()
            .ok_or(AuthError::Unauthenticated)
    }

    /// Load the active identity for `user_id`, or `None` if the account is
    /// gone or deactivated.
    pub async fn load_identity(&self, user_id: Uuid) -> AuthResult<Option<Identity>> {
        let user = match self.users.get_by_id(user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Ok(None);
        }
        Ok(Some(self.identity_for(&user).await?))
    }

    async fn identity_for(&self, user: &User) -> AuthResult<Identity> {
        let roles = self.roles.get_user_roles(user.id).await?;
        Ok(Identity::from_user(user, &roles))
    }

    /// Check an email/password pair.
    ///
    /// Unknown email, wrong password, unreadable stored hash and inactive
    /// account all fail with the same [`AuthError::InvalidCredentials`].
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                // Spend the same hashing work as a real account would.
                let _ = self.verifier.verify(password, UNKNOWN_ACCOUNT_HASH);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let valid = match self.verifier.verify(password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                false
            }
        };
        if !valid || !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        self.identity_for(&user).await
    }

    /// Authenticate and issue an access token plus the first refresh
    /// token of a new family.
    pub async fn login(&self, input: LoginInput) -> AuthResult<LoginOutput> {
        let identity = self.authenticate(&input.email, &input.password).await?;

        let refresh = self.refresh.issue(identity.id, &input.client, None).await?;
        let access_token = self.codec.issue(identity.id)?;

        info!(
            user_id = %identity.id,
            family = %refresh.record.family,
            "Login succeeded"
        );

        Ok(LoginOutput {
            access_token,
            refresh_token: refresh.secret,
            identity,
            expires_in: self.codec.ttl_secs(),
        })
    }

    /// Exchange a refresh token for a new access token and a rotated
    /// refresh token.
    ///
    /// Presenting a token that was already rotated revokes its whole
    /// family.
    pub async fn refresh(&self, input: RefreshInput) -> AuthResult<RefreshOutput> {
        let raw = input.raw_refresh_token.trim();
        let Some(record) = self.refresh.lookup(raw).await? else {
            return Err(AuthError::InvalidRefresh);
        };

        if !record.is_active_at(Utc::now()) {
            if record.is_superseded() {
                let revoked = self.refresh.revoke_family(record.family).await?;
                warn!(
                    user_id = %record.user_id,
                    family = %record.family,
                    token_id = %record.id,
                    revoked,
                    "Superseded refresh token presented; family revoked"
                );
            }
            return Err(AuthError::InvalidRefresh);
        }

        if self.load_identity(record.user_id).await?.is_none() {
            self.refresh.revoke(&record).await?;
            warn!(user_id = %record.user_id, "Refresh token owner is gone or inactive");
            return Err(AuthError::InvalidRefresh);
        }

        let rotated = self.refresh.rotate(&record, &input.client).await?;
        let access_token = self.codec.issue(record.user_id)?;

        Ok(RefreshOutput {
            access_token,
            refresh_token: rotated.secret,
            expires_in: self.codec.ttl_secs(),
        })
    }

    /// Revoke the presented refresh token. Unknown or already revoked
    /// tokens are not an error; returns whether anything was revoked.
    pub async fn logout(&self, raw_refresh_token: &str) -> AuthResult<bool> {
        match self.refresh.lookup(raw_refresh_token.trim()).await? {
            Some(record) => self.refresh.revoke(&record).await,
            None => Ok(false),
        }
    }

    /// Revoke every refresh token of a user (e.g. on password change).
    pub async fn logout_everywhere(&self, user_id: Uuid) -> AuthResult<u64> {
        let revoked = self.refresh.revoke_all_for_user(user_id).await?;
        info!(user_id = %user_id, revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }

    /// Diagnostics only: report exactly why the bearer token in
    /// `authorization` does or does not verify.
    pub fn inspect(&self, authorization: Option<&str>) -> TokenInspection {
        let token = authorization.and_then(parse_bearer).unwrap_or_default();
        self.codec.inspect_at(&token, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use custos_core::models::user::CreateUser;
    use custos_db::MemoryStore;

    use super::*;
    use crate::password::{Argon2Verifier, hash_password};

    #[derive(Clone, Default)]
    struct CountingVerifier {
        inner: Argon2Verifier,
        calls: Arc<AtomicUsize>,
    }

    impl PasswordVerifier for CountingVerifier {
        fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(password, hash)
        }
    }

    fn service(
        store: &MemoryStore,
        verifier: CountingVerifier,
    ) -> AuthService<MemoryStore, MemoryStore, MemoryStore, CountingVerifier> {
        let config = AuthConfig {
            jwt_secret: "service-test-secret".into(),
            ..Default::default()
        };
        AuthService::new(store.clone(), store.clone(), store.clone(), verifier, config).unwrap()
    }

    #[test]
    fn unknown_account_hash_is_well_formed() {
        assert!(!Argon2Verifier::default()
            .verify("anything", UNKNOWN_ACCOUNT_HASH)
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_email_still_verifies_a_hash() {
        let store = MemoryStore::new();
        let verifier = CountingVerifier::default();
        let service = service(&store, verifier.clone());

        let err = service
            .authenticate("nobody@example.com", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let store = MemoryStore::new();
        UserRepository::create(
            &store,
            CreateUser::new("bob@example.com", hash_password("right", None).unwrap()),
        )
        .await
        .unwrap();
        let verifier = CountingVerifier::default();
        let service = service(&store, verifier.clone());

        let wrong = service.authenticate("bob@example.com", "wrong").await.unwrap_err();
        let unknown = service.authenticate("eve@example.com", "wrong").await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer("Bearer abc").as_deref(), Some("abc"));
        assert_eq!(parse_bearer("bEaReR abc").as_deref(), Some("abc"));
        assert_eq!(parse_bearer("  Bearer   abc  ").as_deref(), Some("abc"));
    }

    #[test]
    fn bearer_requires_exactly_two_parts() {
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn other_schemes_are_ignored() {
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("Token abc"), None);
    }

    #[test]
    fn surrounding_quotes_are_stripped() {
        assert_eq!(parse_bearer("Bearer \"abc\"").as_deref(), Some("abc"));
        assert_eq!(parse_bearer("Bearer 'abc'").as_deref(), Some("abc"));
        assert_eq!(parse_bearer("Bearer \"abc").as_deref(), Some("\"abc"));
        assert_eq!(parse_bearer("Bearer \"\""), None);
    }
}
