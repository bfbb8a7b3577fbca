use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKind {
    Member,
    Guest,
}

impl std::fmt::Display for UserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserKind::Member => write!(f, "Member"),
            UserKind::Guest => write!(f, "Guest"),
        }
    }
}

/// An Entra ID user as returned by `/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: String,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(rename = "accountEnabled", default)]
    pub account_enabled: Option<bool>,
    #[serde(rename = "userType", default)]
    pub user_type: Option<String>,
    #[serde(rename = "jobTitle", default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(rename = "usageLocation", default)]
    pub usage_location: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "onPremisesSyncEnabled", default)]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(rename = "assignedLicenses", default)]
    pub assigned_licenses: Vec<AssignedLicense>,
    #[serde(rename = "signInActivity", default)]
    pub sign_in_activity: Option<SignInActivity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedLicense {
    #[serde(rename = "skuId")]
    pub sku_id: String,
    #[serde(rename = "disabledPlans", default)]
    pub disabled_plans: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInActivity {
    #[serde(rename = "lastSignInDateTime", default)]
    pub last_sign_in_date_time: Option<String>,
    #[serde(rename = "lastNonInteractiveSignInDateTime", default)]
    pub last_non_interactive_sign_in_date_time: Option<String>,
}

impl User {
    pub fn kind(&self) -> UserKind {
        match self.user_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("guest") => UserKind::Guest,
            // External identities carry #EXT# in the UPN even when userType is missing
            _ if self.user_principal_name.contains("#EXT#") => UserKind::Guest,
            _ => UserKind::Member,
        }
    }

    /// Accounts without an explicit flag are treated as enabled, as Graph omits it on `$select`.
    pub fn is_enabled(&self) -> bool {
        self.account_enabled.unwrap_or(true)
    }

    pub fn is_licensed(&self) -> bool {
        !self.assigned_licenses.is_empty()
    }

    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.user_principal_name)
    }

    /// Most recent interactive or non-interactive sign-in.
    pub fn last_sign_in(&self) -> Option<DateTime<Utc>> {
        let activity = self.sign_in_activity.as_ref()?;
        [
            activity.last_sign_in_date_time.as_deref(),
            activity.last_non_interactive_sign_in_date_time.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> User {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_graph_user() {
        let user = parse(
            r#"{
                "id": "11111111-2222-3333-4444-555555555555",
                "displayName": "Adele Vance",
                "userPrincipalName": "AdeleV@contoso.com",
                "accountEnabled": true,
                "userType": "Member",
                "assignedLicenses": [{"skuId": "sku-1", "disabledPlans": []}],
                "signInActivity": {
                    "lastSignInDateTime": "2024-01-02T10:00:00Z",
                    "lastNonInteractiveSignInDateTime": "2024-02-03T10:00:00Z"
                }
            }"#,
        );
        assert_eq!(user.name(), "Adele Vance");
        assert_eq!(user.kind(), UserKind::Member);
        assert!(user.is_enabled());
        assert!(user.is_licensed());
        let last = user.last_sign_in().unwrap();
        assert_eq!(last.to_rfc3339(), "2024-02-03T10:00:00+00:00");
    }

    #[test]
    fn test_guest_detection_from_upn() {
        let user = parse(r#"{"id": "g", "userPrincipalName": "bob_fabrikam.com#EXT#@contoso.onmicrosoft.com"}"#);
        assert_eq!(user.kind(), UserKind::Guest);
        assert_eq!(user.name(), "bob_fabrikam.com#EXT#@contoso.onmicrosoft.com");
        assert!(user.last_sign_in().is_none());
    }
}
