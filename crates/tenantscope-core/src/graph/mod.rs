//! Microsoft Graph client module.
//!
//! This module provides the `GraphClient` used by every dashboard to read
//! directory, security, service health, collaboration and Purview data.
//!
//! Requests carry a bearer token acquired through the `auth` module.

pub mod client;
pub mod error;

pub use client::{ApiVersion, GraphClient, GRAPH_BASE_URL};
pub use error::{is_permission_denied, GraphError};
