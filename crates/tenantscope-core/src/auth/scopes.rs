//! Delegated Graph permissions, grouped by console feature area.

pub const USER_READ: &str = "User.Read";
pub const USER_READ_ALL: &str = "User.Read.All";
pub const GROUP_READ_ALL: &str = "Group.Read.All";
pub const DEVICE_READ_ALL: &str = "Device.Read.All";
pub const APPLICATION_READ_ALL: &str = "Application.Read.All";
pub const DIRECTORY_READ_ALL: &str = "Directory.Read.All";
pub const ORGANIZATION_READ_ALL: &str = "Organization.Read.All";
pub const AUDIT_LOG_READ_ALL: &str = "AuditLog.Read.All";
pub const SECURITY_EVENTS_READ_ALL: &str = "SecurityEvents.Read.All";
pub const SERVICE_HEALTH_READ_ALL: &str = "ServiceHealth.Read.All";
pub const SERVICE_MESSAGE_READ_ALL: &str = "ServiceMessage.Read.All";
pub const REPORTS_READ_ALL: &str = "Reports.Read.All";
pub const SITES_READ_ALL: &str = "Sites.Read.All";
pub const TEAM_READ_BASIC_ALL: &str = "Team.ReadBasic.All";
pub const INFORMATION_PROTECTION_POLICY_READ: &str = "InformationProtectionPolicy.Read";

/// Needed for a refresh token.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// Scopes to request at sign-in: the base scopes plus every feature area's
/// scopes, deduplicated, in first-seen order.
pub fn login_scopes<'a>(areas: impl IntoIterator<Item = &'a [&'static str]>) -> Vec<String> {
    let mut scopes: Vec<String> = vec![USER_READ.to_string(), OFFLINE_ACCESS.to_string()];
    for area in areas {
        for scope in area.iter() {
            if !scopes.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
                scopes.push(scope.to_string());
            }
        }
    }
    scopes
}
