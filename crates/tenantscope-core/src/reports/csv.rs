//! CSV exports.
//!
//! Every field is quoted and embedded quotes are doubled, so spreadsheets
//! never reinterpret values such as `=SUM(...)` or leading zeros.

use anyhow::{anyhow, Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use crate::insights::{ImprovementAction, LicenseUsage};
use crate::models::{Device, Group, Site, User};

/// A header row plus string records.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Short rows are padded so every record has a field per column.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() < self.headers.len() {
            row.resize(self.headers.len(), String::new());
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .flexible(true)
            .from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            writer.write_record(row).context("Failed to write CSV record")?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "Yes".to_string(),
        Some(false) => "No".to_string(),
        None => String::new(),
    }
}

pub fn users_csv(users: &[&User]) -> Result<String> {
    let mut table = CsvTable::new(&[
        "Display Name",
        "User Principal Name",
        "Mail",
        "Type",
        "Enabled",
        "Licensed",
        "Department",
        "Job Title",
        "Last Sign-In",
        "Created",
    ]);
    for user in users {
        table.push_row(vec![
            user.name().to_string(),
            user.user_principal_name.clone(),
            opt(&user.mail),
            user.kind().to_string(),
            flag(Some(user.is_enabled())),
            flag(Some(user.is_licensed())),
            opt(&user.department),
            opt(&user.job_title),
            user.last_sign_in().map(|d| d.to_rfc3339()).unwrap_or_default(),
            opt(&user.created_date_time),
        ]);
    }
    table.to_csv()
}

pub fn groups_csv(groups: &[Group]) -> Result<String> {
    let mut table = CsvTable::new(&["Display Name", "Type", "Mail", "Visibility", "Team", "Description", "Created"]);
    for group in groups {
        table.push_row(vec![
            opt(&group.display_name),
            group.kind().to_string(),
            opt(&group.mail),
            opt(&group.visibility),
            flag(Some(group.is_team())),
            opt(&group.description),
            opt(&group.created_date_time),
        ]);
    }
    table.to_csv()
}

pub fn devices_csv(devices: &[Device]) -> Result<String> {
    let mut table = CsvTable::new(&[
        "Display Name",
        "Operating System",
        "Version",
        "Enabled",
        "Compliant",
        "Managed",
        "Trust Type",
        "Last Sign-In",
    ]);
    for device in devices {
        table.push_row(vec![
            opt(&device.display_name),
            opt(&device.operating_system),
            opt(&device.operating_system_version),
            flag(device.account_enabled),
            flag(device.is_compliant),
            flag(device.is_managed),
            opt(&device.trust_type),
            opt(&device.approximate_last_sign_in_date_time),
        ]);
    }
    table.to_csv()
}

pub fn licenses_csv(usage: &[LicenseUsage]) -> Result<String> {
    let mut table = CsvTable::new(&["SKU", "Consumed", "Enabled", "Available", "Utilization %"]);
    for sku in usage {
        table.push_row(vec![
            sku.sku.clone(),
            sku.consumed.to_string(),
            sku.enabled.to_string(),
            sku.available.to_string(),
            format!("{:.1}", sku.percent),
        ]);
    }
    table.to_csv()
}

pub fn sites_csv(sites: &[Site]) -> Result<String> {
    let mut table = CsvTable::new(&["Title", "URL", "Created", "Last Modified"]);
    for site in sites {
        table.push_row(vec![
            site.title().to_string(),
            opt(&site.web_url),
            opt(&site.created_date_time),
            opt(&site.last_modified_date_time),
        ]);
    }
    table.to_csv()
}

pub fn secure_score_actions_csv(actions: &[ImprovementAction]) -> Result<String> {
    let mut table = CsvTable::new(&[
        "Action",
        "Category",
        "Current Score",
        "Max Score",
        "Points Available",
        "User Impact",
        "Implementation Cost",
    ]);
    for action in actions {
        table.push_row(vec![
            action.title.clone(),
            opt(&action.category),
            format!("{:.2}", action.current),
            format!("{:.2}", action.max_score),
            format!("{:.2}", action.points_available()),
            opt(&action.user_impact),
            opt(&action.implementation_cost),
        ]);
    }
    table.to_csv()
}

/// Export any cached section. Arrays of objects become one record per
/// element, with columns in first-seen key order; a single object becomes
/// one record. Nested values are written as compact JSON.
pub fn json_csv(data: &Value) -> Result<String> {
    let items: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };

    let mut columns: Vec<String> = Vec::new();
    for item in &items {
        match item {
            Value::Object(map) => {
                for key in map.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            _ => {
                if !columns.iter().any(|c| c == "value") {
                    columns.push("value".to_string());
                }
            }
        }
    }

    let mut table = CsvTable::new(&columns[..]);
    for item in items {
        let row = columns
            .iter()
            .map(|column| match item {
                Value::Object(map) => map.get(column).map(cell).unwrap_or_default(),
                scalar if column == "value" => cell(scalar),
                _ => String::new(),
            })
            .collect();
        table.push_row(row);
    }
    table.to_csv()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
