//! Data models for Microsoft Graph entities.
//!
//! - `User`: Entra ID accounts with license and sign-in activity
//! - Directory objects: `Group`, `Device`, `Application`, `ServicePrincipal`,
//!   `Domain`, `Organization`
//! - `SubscribedSku`: license inventory
//! - Security: `SecureScore`, `SecureScoreControlProfile`
//! - Service announcements: `ServiceHealth`, `ServiceHealthIssue`, `ServiceUpdateMessage`
//! - Collaboration: `Site`, `Team`, `MailboxUsage`
//! - Logs: `SignIn`, `DirectoryAudit`
//! - Purview: `SensitivityLabel`

pub mod audit;
pub mod collaboration;
pub mod compliance;
pub mod directory;
pub mod health;
pub mod licensing;
pub mod odata;
pub mod security;
pub mod user;

pub use audit::{DirectoryAudit, SignIn, SignInLocation, SignInStatus};
pub use collaboration::{parse_mailbox_usage_csv, MailboxUsage, Site, Team};
pub use compliance::SensitivityLabel;
pub use directory::{
    AppCredential, Application, Device, Domain, Group, Organization, ServicePrincipal,
    VerifiedDomain,
};
pub use health::{ServiceHealth, ServiceHealthIssue, ServiceUpdateMessage};
pub use licensing::{PrepaidUnits, SubscribedSku};
pub use odata::ODataPage;
pub use security::{ControlScore, SecureScore, SecureScoreControlProfile};
pub use user::{AssignedLicense, SignInActivity, User, UserKind};
