//! Registry-side support: default registry rules, logins, and token auth

pub(crate) mod auth;
mod credentials;
mod default;

pub use credentials::{AuthConfig, CredentialStore};
pub use default::{DefaultRegistry, DEFAULT_INDEX_SERVER};
