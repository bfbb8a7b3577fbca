//! Service Health and Message Center types from `/admin/serviceAnnouncement`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub status: String,
}

impl ServiceHealth {
    pub fn is_operational(&self) -> bool {
        matches!(self.status.as_str(), "serviceOperational" | "serviceRestored" | "falsePositive")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceHealthIssue {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(rename = "startDateTime", default)]
    pub start_date_time: Option<String>,
    #[serde(rename = "lastModifiedDateTime", default)]
    pub last_modified_date_time: Option<String>,
    #[serde(rename = "isResolved", default)]
    pub is_resolved: bool,
    #[serde(rename = "impactDescription", default)]
    pub impact_description: Option<String>,
}

/// Message Center post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdateMessage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(rename = "startDateTime", default)]
    pub start_date_time: Option<String>,
    #[serde(rename = "lastModifiedDateTime", default)]
    pub last_modified_date_time: Option<String>,
    #[serde(rename = "actionRequiredByDateTime", default)]
    pub action_required_by_date_time: Option<String>,
    #[serde(rename = "isMajorChange", default)]
    pub is_major_change: Option<bool>,
}
