//! Custos Core: domain models, error types and the repository
//! traits that storage backends implement.
//!
//! Nothing in this crate performs I/O. The authentication and
//! authorization logic lives in `custos-auth`; storage backends live in
//! `custos-db`.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{CustosError, CustosResult};
pub use models::access_rule::{AccessRule, Action, UpsertAccessRule};
pub use models::business_element::{BusinessElement, CreateBusinessElement};
pub use models::identity::Identity;
pub use models::refresh_token::{ClientContext, CreateRefreshToken, RefreshToken};
pub use models::role::{CreateRole, Role};
pub use models::user::{CreateUser, UpdateUser, User};
