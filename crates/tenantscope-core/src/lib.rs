//! tenantscope core library.
//!
//! Everything the console needs that is not presentation:
//! - `auth`: identity platform sign-in and session persistence
//! - `graph`: Microsoft Graph client
//! - `models`: Graph entities
//! - `store`: the section cache shared across commands
//! - `refresh`: loading dashboard sections into the cache
//! - `insights`: filtering and roll-ups over cached data
//! - `reports`: CSV exports and PowerShell remediation scripts
//! - `contact`: support form submission

pub mod auth;
pub mod config;
pub mod contact;
pub mod graph;
pub mod insights;
pub mod models;
pub mod refresh;
pub mod reports;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{Config, APP_NAME};
