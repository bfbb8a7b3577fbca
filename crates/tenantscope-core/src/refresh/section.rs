use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

use crate::auth::scopes::*;

/// A dashboard whose Graph result is cached under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Organization,
    Users,
    Groups,
    Devices,
    Applications,
    ServicePrincipals,
    Domains,
    Licenses,
    SecureScore,
    SecureScoreControls,
    ServiceHealth,
    ServiceIssues,
    MessageCenter,
    SignIns,
    AuditLogs,
    Sites,
    Teams,
    Mailboxes,
    SensitivityLabels,
}

impl Section {
    pub const ALL: [Section; 19] = [
        Section::Organization,
        Section::Users,
        Section::Groups,
        Section::Devices,
        Section::Applications,
        Section::ServicePrincipals,
        Section::Domains,
        Section::Licenses,
        Section::SecureScore,
        Section::SecureScoreControls,
        Section::ServiceHealth,
        Section::ServiceIssues,
        Section::MessageCenter,
        Section::SignIns,
        Section::AuditLogs,
        Section::Sites,
        Section::Teams,
        Section::Mailboxes,
        Section::SensitivityLabels,
    ];

    /// Cache key, also accepted on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Section::Organization => "organization",
            Section::Users => "users",
            Section::Groups => "groups",
            Section::Devices => "devices",
            Section::Applications => "applications",
            Section::ServicePrincipals => "enterprise-apps",
            Section::Domains => "domains",
            Section::Licenses => "licenses",
            Section::SecureScore => "secure-score",
            Section::SecureScoreControls => "secure-score-controls",
            Section::ServiceHealth => "service-health",
            Section::ServiceIssues => "service-issues",
            Section::MessageCenter => "message-center",
            Section::SignIns => "sign-ins",
            Section::AuditLogs => "audit-logs",
            Section::Sites => "sharepoint-sites",
            Section::Teams => "teams",
            Section::Mailboxes => "exchange-mailboxes",
            Section::SensitivityLabels => "purview-labels",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Organization => "Organization",
            Section::Users => "Users",
            Section::Groups => "Groups",
            Section::Devices => "Devices",
            Section::Applications => "App Registrations",
            Section::ServicePrincipals => "Enterprise Applications",
            Section::Domains => "Domains",
            Section::Licenses => "Licenses",
            Section::SecureScore => "Secure Score",
            Section::SecureScoreControls => "Secure Score Actions",
            Section::ServiceHealth => "Service Health",
            Section::ServiceIssues => "Service Issues",
            Section::MessageCenter => "Message Center",
            Section::SignIns => "Sign-in Logs",
            Section::AuditLogs => "Audit Logs",
            Section::Sites => "SharePoint Sites",
            Section::Teams => "Teams",
            Section::Mailboxes => "Exchange Mailboxes",
            Section::SensitivityLabels => "Sensitivity Labels",
        }
    }

    /// Console path recorded in the navigation history.
    pub fn path(&self) -> &'static str {
        match self {
            Section::Organization => "/admin/organization",
            Section::Users => "/entra/users",
            Section::Groups => "/entra/groups",
            Section::Devices => "/entra/devices",
            Section::Applications => "/entra/applications",
            Section::ServicePrincipals => "/entra/enterprise-apps",
            Section::Domains => "/admin/domains",
            Section::Licenses => "/admin/licenses",
            Section::SecureScore => "/security/secure-score",
            Section::SecureScoreControls => "/security/secure-score/actions",
            Section::ServiceHealth => "/admin/service-health",
            Section::ServiceIssues => "/admin/service-health/issues",
            Section::MessageCenter => "/admin/message-center",
            Section::SignIns => "/entra/sign-ins",
            Section::AuditLogs => "/entra/audit-logs",
            Section::Sites => "/sharepoint/sites",
            Section::Teams => "/teams",
            Section::Mailboxes => "/exchange/mailboxes",
            Section::SensitivityLabels => "/purview/labels",
        }
    }

    /// Graph endpoint, recorded in cache metadata.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Section::Organization => "/v1.0/organization",
            Section::Users => "/v1.0/users",
            Section::Groups => "/v1.0/groups",
            Section::Devices => "/v1.0/devices",
            Section::Applications => "/v1.0/applications",
            Section::ServicePrincipals => "/v1.0/servicePrincipals",
            Section::Domains => "/v1.0/domains",
            Section::Licenses => "/v1.0/subscribedSkus",
            Section::SecureScore => "/v1.0/security/secureScores",
            Section::SecureScoreControls => "/v1.0/security/secureScoreControlProfiles",
            Section::ServiceHealth => "/v1.0/admin/serviceAnnouncement/healthOverviews",
            Section::ServiceIssues => "/v1.0/admin/serviceAnnouncement/issues",
            Section::MessageCenter => "/v1.0/admin/serviceAnnouncement/messages",
            Section::SignIns => "/v1.0/auditLogs/signIns",
            Section::AuditLogs => "/v1.0/auditLogs/directoryAudits",
            Section::Sites => "/v1.0/sites",
            Section::Teams => "/v1.0/groups",
            Section::Mailboxes => "/v1.0/reports/getMailboxUsageDetail",
            Section::SensitivityLabels => "/beta/security/informationProtection/sensitivityLabels",
        }
    }

    /// Delegated permissions the section's fetch needs.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Section::Organization => &[ORGANIZATION_READ_ALL],
            Section::Users => &[USER_READ_ALL, AUDIT_LOG_READ_ALL],
            Section::Groups => &[GROUP_READ_ALL],
            Section::Devices => &[DEVICE_READ_ALL],
            Section::Applications | Section::ServicePrincipals => &[APPLICATION_READ_ALL],
            Section::Domains => &[DIRECTORY_READ_ALL],
            Section::Licenses => &[ORGANIZATION_READ_ALL],
            Section::SecureScore | Section::SecureScoreControls => &[SECURITY_EVENTS_READ_ALL],
            Section::ServiceHealth | Section::ServiceIssues => &[SERVICE_HEALTH_READ_ALL],
            Section::MessageCenter => &[SERVICE_MESSAGE_READ_ALL],
            Section::SignIns | Section::AuditLogs => &[AUDIT_LOG_READ_ALL],
            Section::Sites => &[SITES_READ_ALL],
            Section::Teams => &[TEAM_READ_BASIC_ALL, GROUP_READ_ALL],
            Section::Mailboxes => &[REPORTS_READ_ALL],
            Section::SensitivityLabels => &[INFORMATION_PROTECTION_POLICY_READ],
        }
    }

    pub fn all_scopes() -> Vec<String> {
        crate::auth::scopes::login_scopes(Section::ALL.iter().map(|s| s.scopes()))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.key() == wanted)
            .or(match wanted.as_str() {
                "sites" => Some(Section::Sites),
                "mailboxes" | "exchange" => Some(Section::Mailboxes),
                "labels" | "purview" => Some(Section::SensitivityLabels),
                "skus" => Some(Section::Licenses),
                "apps" => Some(Section::Applications),
                "service-principals" | "enterprise-applications" => Some(Section::ServicePrincipals),
                "audit" => Some(Section::AuditLogs),
                _ => None,
            })
            .ok_or_else(|| anyhow!("Unknown section '{}'", s))
    }
}
