//! Authentication module for signing administrators in to Microsoft Graph.
//!
//! This module provides:
//! - `IdentityClient`: device code, refresh token and client credential grants
//! - `Session`: token persistence, sealed with a `Vault` key
//! - `CredentialStore`: OS keychain storage for secrets and the vault passphrase
//! - `TokenProvider`: hands out valid access tokens, renewing as needed
//! - `scopes`: delegated permissions per feature area

pub mod credentials;
pub mod identity;
pub mod provider;
pub mod scopes;
pub mod session;
pub mod vault;

pub use credentials::CredentialStore;
pub use identity::{AuthError, DeviceCode, IdentityClient};
pub use provider::TokenProvider;
pub use session::{Session, SessionData};
pub use vault::Vault;
