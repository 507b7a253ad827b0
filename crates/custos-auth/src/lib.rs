//! Custos Auth: bearer authentication, refresh token rotation and
//! role-based authorization decisions.

pub mod config;
pub mod error;
pub mod gate;
pub mod password;
mod permission;
pub mod principal;
pub mod refresh;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use gate::{AuthorizationGate, Decision, ReadScope};
pub use password::{Argon2Verifier, PasswordVerifier, hash_password};
pub use permission::decide;
pub use principal::Principal;
pub use refresh::{IssuedRefreshToken, RefreshTokenStore};
pub use service::{AuthService, LoginInput, LoginOutput, RefreshInput, RefreshOutput, parse_bearer};
pub use token::{AccessTokenClaims, TokenCodec, TokenFailure, TokenInspection};
