use serde::{Deserialize, Serialize};

/// Daily Secure Score snapshot (`/security/secureScores`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecureScore {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "currentScore", default)]
    pub current_score: f64,
    #[serde(rename = "maxScore", default)]
    pub max_score: f64,
    #[serde(rename = "activeUserCount", default)]
    pub active_user_count: Option<i64>,
    #[serde(rename = "licensedUserCount", default)]
    pub licensed_user_count: Option<i64>,
    #[serde(rename = "controlScores", default)]
    pub control_scores: Vec<ControlScore>,
}

impl SecureScore {
    pub fn percent(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            self.current_score * 100.0 / self.max_score
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlScore {
    #[serde(rename = "controlName", default)]
    pub control_name: String,
    #[serde(rename = "controlCategory", default)]
    pub control_category: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Improvement action metadata (`/security/secureScoreControlProfiles`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecureScoreControlProfile {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "maxScore", default)]
    pub max_score: f64,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(rename = "controlCategory", default)]
    pub control_category: Option<String>,
    #[serde(rename = "implementationCost", default)]
    pub implementation_cost: Option<String>,
    #[serde(rename = "userImpact", default)]
    pub user_impact: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(rename = "actionUrl", default)]
    pub action_url: Option<String>,
}
