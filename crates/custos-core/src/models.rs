//! Domain models for Custos.
//!
//! These are the core types shared across all crates.

pub mod access_rule;
pub mod business_element;
pub mod identity;
pub mod refresh_token;
pub mod role;
pub mod user;
