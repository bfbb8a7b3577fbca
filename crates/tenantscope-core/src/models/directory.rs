//! Directory objects: groups, devices, app registrations, domains and the
//! organization itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(rename = "mailEnabled", default)]
    pub mail_enabled: Option<bool>,
    #[serde(rename = "securityEnabled", default)]
    pub security_enabled: Option<bool>,
    #[serde(rename = "groupTypes", default)]
    pub group_types: Vec<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "resourceProvisioningOptions", default)]
    pub resource_provisioning_options: Vec<String>,
}

impl Group {
    /// Short label used in tables and CSV exports.
    pub fn kind(&self) -> &'static str {
        let unified = self.group_types.iter().any(|t| t == "Unified");
        let dynamic = self.group_types.iter().any(|t| t == "DynamicMembership");
        match (unified, dynamic, self.security_enabled.unwrap_or(false), self.mail_enabled.unwrap_or(false)) {
            (true, true, _, _) => "Microsoft 365 (dynamic)",
            (true, false, _, _) => "Microsoft 365",
            (false, _, true, true) => "Mail-enabled security",
            (false, true, true, false) => "Security (dynamic)",
            (false, false, true, false) => "Security",
            (false, _, false, true) => "Distribution",
            _ => "Other",
        }
    }

    pub fn is_team(&self) -> bool {
        self.resource_provisioning_options.iter().any(|o| o == "Team")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "operatingSystem", default)]
    pub operating_system: Option<String>,
    #[serde(rename = "operatingSystemVersion", default)]
    pub operating_system_version: Option<String>,
    #[serde(rename = "accountEnabled", default)]
    pub account_enabled: Option<bool>,
    #[serde(rename = "isCompliant", default)]
    pub is_compliant: Option<bool>,
    #[serde(rename = "isManaged", default)]
    pub is_managed: Option<bool>,
    #[serde(rename = "trustType", default)]
    pub trust_type: Option<String>,
    #[serde(rename = "approximateLastSignInDateTime", default)]
    pub approximate_last_sign_in_date_time: Option<String>,
}

/// App registration (`/applications`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(rename = "appId", default)]
    pub app_id: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "signInAudience", default)]
    pub sign_in_audience: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "passwordCredentials", default)]
    pub password_credentials: Vec<AppCredential>,
    #[serde(rename = "keyCredentials", default)]
    pub key_credentials: Vec<AppCredential>,
}

/// Client secret or certificate attached to an app registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppCredential {
    #[serde(rename = "keyId", default)]
    pub key_id: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "endDateTime", default)]
    pub end_date_time: Option<String>,
}

/// Enterprise application (`/servicePrincipals`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePrincipal {
    pub id: String,
    #[serde(rename = "appId", default)]
    pub app_id: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "servicePrincipalType", default)]
    pub service_principal_type: Option<String>,
    #[serde(rename = "accountEnabled", default)]
    pub account_enabled: Option<bool>,
    #[serde(rename = "appOwnerOrganizationId", default)]
    pub app_owner_organization_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServicePrincipal {
    /// Integrated apps carry this tag; first-party and managed identities do not.
    pub fn is_integrated_app(&self) -> bool {
        self.tags.iter().any(|t| t == "WindowsAzureActiveDirectoryIntegratedApp")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(rename = "isInitial", default)]
    pub is_initial: bool,
    #[serde(rename = "authenticationType", default)]
    pub authentication_type: Option<String>,
    #[serde(rename = "supportedServices", default)]
    pub supported_services: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "tenantType", default)]
    pub tenant_type: Option<String>,
    #[serde(rename = "countryLetterCode", default)]
    pub country_letter_code: Option<String>,
    #[serde(rename = "verifiedDomains", default)]
    pub verified_domains: Vec<VerifiedDomain>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifiedDomain {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_kind() {
        let m365: Group = serde_json::from_str(
            r#"{"id":"1","groupTypes":["Unified"],"mailEnabled":true,"securityEnabled":false,
                "resourceProvisioningOptions":["Team"]}"#,
        )
        .unwrap();
        assert_eq!(m365.kind(), "Microsoft 365");
        assert!(m365.is_team());

        let security: Group =
            serde_json::from_str(r#"{"id":"2","groupTypes":[],"securityEnabled":true,"mailEnabled":false}"#).unwrap();
        assert_eq!(security.kind(), "Security");
        assert!(!security.is_team());

        let dl: Group =
            serde_json::from_str(r#"{"id":"3","securityEnabled":false,"mailEnabled":true}"#).unwrap();
        assert_eq!(dl.kind(), "Distribution");
    }

    #[test]
    fn test_parse_application_credentials() {
        let app: Application = serde_json::from_str(
            r#"{"id":"a","appId":"b","displayName":"Payroll",
                "passwordCredentials":[{"keyId":"k1","displayName":"ci","endDateTime":"2025-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(app.password_credentials.len(), 1);
        assert!(app.key_credentials.is_empty());
    }

    #[test]
    fn test_parse_service_principal() {
        let sp: ServicePrincipal = serde_json::from_str(
            r#"{"id":"s","appId":"b","displayName":"Payroll","servicePrincipalType":"Application",
                "accountEnabled":true,"tags":["WindowsAzureActiveDirectoryIntegratedApp"]}"#,
        )
        .unwrap();
        assert!(sp.is_integrated_app());
        assert_eq!(sp.account_enabled, Some(true));

        let managed: ServicePrincipal =
            serde_json::from_str(r#"{"id":"m","servicePrincipalType":"ManagedIdentity"}"#).unwrap();
        assert!(!managed.is_integrated_app());
    }
}
