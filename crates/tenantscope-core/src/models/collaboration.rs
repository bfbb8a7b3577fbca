//! SharePoint, Teams and Exchange mailbox usage types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "webUrl", default)]
    pub web_url: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
    #[serde(rename = "lastModifiedDateTime", default)]
    pub last_modified_date_time: Option<String>,
}

impl Site {
    pub fn title(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// A team, listed through its backing Microsoft 365 group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<String>,
}

/// Row of the `getMailboxUsageDetail` report. The report is CSV, so the
/// field names are the report's column headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxUsage {
    #[serde(rename = "User Principal Name", alias = "userPrincipalName", default)]
    pub user_principal_name: String,
    #[serde(rename = "Display Name", alias = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "Is Deleted", alias = "isDeleted", default, deserialize_with = "de_flag")]
    pub is_deleted: bool,
    #[serde(rename = "Last Activity Date", alias = "lastActivityDate", default)]
    pub last_activity_date: Option<String>,
    #[serde(rename = "Item Count", alias = "itemCount", default, deserialize_with = "de_count")]
    pub item_count: u64,
    #[serde(rename = "Storage Used (Byte)", alias = "storageUsedInBytes", default, deserialize_with = "de_count")]
    pub storage_used_bytes: u64,
    #[serde(rename = "Prohibit Send Quota (Byte)", alias = "prohibitSendQuotaInBytes", default, deserialize_with = "de_count")]
    pub prohibit_send_quota_bytes: u64,
    #[serde(rename = "Has Archive", alias = "hasArchive", default, deserialize_with = "de_flag")]
    pub has_archive: bool,
    #[serde(rename = "Recipient Type", alias = "recipientType", default)]
    pub recipient_type: Option<String>,
}

impl MailboxUsage {
    /// Storage used as a share of the prohibit-send quota, if a quota is set.
    pub fn quota_percent(&self) -> Option<f64> {
        if self.prohibit_send_quota_bytes == 0 {
            None
        } else {
            Some(self.storage_used_bytes as f64 * 100.0 / self.prohibit_send_quota_bytes as f64)
        }
    }
}

/// Report columns arrive as text ("True", "12345", "") or, once cached, as JSON values.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Parse the CSV body returned by the mailbox usage report.
pub fn parse_mailbox_usage_csv(body: &str) -> anyhow::Result<Vec<MailboxUsage>> {
    // Reports start with a UTF-8 BOM
    let body = body.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: MailboxUsage = record?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\u{feff}Report Refresh Date,User Principal Name,Display Name,Is Deleted,Deleted Date,Created Date,Last Activity Date,Item Count,Storage Used (Byte),Issue Warning Quota (Byte),Prohibit Send Quota (Byte),Prohibit Send/Receive Quota (Byte),Deleted Item Count,Deleted Item Size (Byte),Deleted Item Quota (Byte),Has Archive,Recipient Type,Report Period\n\
2024-05-01,AdeleV@contoso.com,Adele Vance,False,,2021-01-01,2024-04-30,1520,5368709120,104890000000,10737418240,107374182400,10,2000,32212254720,True,User,7\n\
2024-05-01,shared@contoso.com,Shared Box,False,,2021-01-01,,0,0,0,0,0,0,0,0,False,Shared,7\n";

    #[test]
    fn test_parse_mailbox_report() {
        let rows = parse_mailbox_usage_csv(REPORT).unwrap();
        assert_eq!(rows.len(), 2);
        let adele = &rows[0];
        assert_eq!(adele.user_principal_name, "AdeleV@contoso.com");
        assert_eq!(adele.item_count, 1520);
        assert!(adele.has_archive);
        assert!(!adele.is_deleted);
        assert!((adele.quota_percent().unwrap() - 50.0).abs() < 1e-9);

        let shared = &rows[1];
        assert_eq!(shared.recipient_type.as_deref(), Some("Shared"));
        assert!(shared.last_activity_date.as_deref().unwrap_or("").is_empty());
        assert!(shared.quota_percent().is_none());
    }

    #[test]
    fn test_cached_json_shape_roundtrips() {
        let rows = parse_mailbox_usage_csv(REPORT).unwrap();
        let value = serde_json::to_value(&rows).unwrap();
        let back: Vec<MailboxUsage> = serde_json::from_value(value).unwrap();
        assert_eq!(back[0].storage_used_bytes, 5_368_709_120);
        assert!(back[0].has_archive);
    }

    #[test]
    fn test_site_title_fallbacks() {
        let site = Site {
            id: "contoso.sharepoint.com,1,2".to_string(),
            name: Some("hr".to_string()),
            ..Default::default()
        };
        assert_eq!(site.title(), "hr");
    }
}
