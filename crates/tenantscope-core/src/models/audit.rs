use serde::{Deserialize, Serialize};

/// Entra ID sign-in log entry (`/auditLogs/signIns`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignIn {
    pub id: String,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: Option<String>,
    #[serde(rename = "userDisplayName", default)]
    pub user_display_name: Option<String>,
    #[serde(rename = "appDisplayName", default)]
    pub app_display_name: Option<String>,
    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "clientAppUsed", default)]
    pub client_app_used: Option<String>,
    #[serde(rename = "conditionalAccessStatus", default)]
    pub conditional_access_status: Option<String>,
    #[serde(default)]
    pub status: SignInStatus,
    #[serde(default)]
    pub location: Option<SignInLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInStatus {
    #[serde(rename = "errorCode", default)]
    pub error_code: i64,
    #[serde(rename = "failureReason", default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInLocation {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "countryOrRegion", default)]
    pub country_or_region: Option<String>,
}

impl SignIn {
    /// Error code 0 is success; everything else is a failed or interrupted sign-in.
    pub fn succeeded(&self) -> bool {
        self.status.error_code == 0
    }
}

/// Directory audit event (`/auditLogs/directoryAudits`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryAudit {
    pub id: String,
    #[serde(rename = "activityDateTime", default)]
    pub activity_date_time: Option<String>,
    #[serde(rename = "activityDisplayName", default)]
    pub activity_display_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "loggedByService", default)]
    pub logged_by_service: Option<String>,
    #[serde(rename = "initiatedBy", default)]
    pub initiated_by: Option<serde_json::Value>,
}

impl DirectoryAudit {
    /// UPN of the initiating user, or the display name of the initiating app.
    pub fn initiator(&self) -> Option<String> {
        let by = self.initiated_by.as_ref()?;
        by.pointer("/user/userPrincipalName")
            .and_then(|v| v.as_str())
            .or_else(|| by.pointer("/app/displayName").and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}
