use serde::{Deserialize, Serialize};

/// Purview sensitivity label (beta `/security/informationProtection/sensitivityLabels`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensitivityLabel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sensitivity: Option<i64>,
    #[serde(rename = "isActive", default)]
    pub is_active: Option<bool>,
    #[serde(rename = "contentFormats", default)]
    pub content_formats: Vec<String>,
}
