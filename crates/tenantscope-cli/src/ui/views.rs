//! Table views of cached sections.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use tenantscope_core::insights::{self, CredentialKind, UserFilter};
use tenantscope_core::models::{
    Application, Device, DirectoryAudit, Domain, Group, MailboxUsage, Organization, SecureScore,
    SecureScoreControlProfile, SensitivityLabel, ServiceHealth, ServiceHealthIssue, ServicePrincipal,
    ServiceUpdateMessage, SignIn, Site, SubscribedSku, Team, User,
};
use tenantscope_core::refresh::Section;
use tenantscope_core::utils::{format_bytes, format_date};

use super::table::Table;

fn parse<T: DeserializeOwned>(section: Section, data: &Value) -> Result<T> {
    serde_json::from_value(data.clone())
        .with_context(|| format!("Cached {} data is not readable", section.title()))
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn date(value: &Option<String>) -> String {
    value.as_deref().map(format_date).unwrap_or_default()
}

fn yes_no(value: Option<bool>) -> String {
    match value {
        Some(true) => "Yes".to_string(),
        Some(false) => "No".to_string(),
        None => "-".to_string(),
    }
}

/// Build the table for a section. `filter` only applies to users.
pub fn section_table(
    section: Section,
    data: &Value,
    filter: Option<UserFilter>,
    now: DateTime<Utc>,
) -> Result<Table> {
    let table = match section {
        Section::Users => {
            let users: Vec<User> = parse(section, data)?;
            users_table(&users, filter.unwrap_or(UserFilter::All), now)
        }
        Section::Groups => {
            let groups: Vec<Group> = parse(section, data)?;
            let mut table = Table::new(&["Name", "Type", "Mail", "Visibility", "Created"]);
            for g in &groups {
                table.push(vec![
                    opt(&g.display_name),
                    g.kind().to_string(),
                    opt(&g.mail),
                    opt(&g.visibility),
                    date(&g.created_date_time),
                ]);
            }
            table
        }
        Section::Devices => {
            let devices: Vec<Device> = parse(section, data)?;
            let mut table = Table::new(&["Name", "OS", "Version", "Compliant", "Managed", "Last Sign-In"]);
            for d in &devices {
                table.push(vec![
                    opt(&d.display_name),
                    opt(&d.operating_system),
                    opt(&d.operating_system_version),
                    yes_no(d.is_compliant),
                    yes_no(d.is_managed),
                    date(&d.approximate_last_sign_in_date_time),
                ]);
            }
            table
        }
        Section::Applications => {
            let apps: Vec<Application> = parse(section, data)?;
            let mut table = Table::new(&["Name", "App ID", "Audience", "Secrets", "Certificates", "Created"]);
            for a in &apps {
                table.push(vec![
                    opt(&a.display_name),
                    opt(&a.app_id),
                    opt(&a.sign_in_audience),
                    a.password_credentials.len().to_string(),
                    a.key_credentials.len().to_string(),
                    date(&a.created_date_time),
                ]);
            }
            table
        }
        Section::ServicePrincipals => {
            let principals: Vec<ServicePrincipal> = parse(section, data)?;
            let mut table = Table::new(&["Name", "App ID", "Type", "Enabled", "Integrated"]);
            for sp in &principals {
                table.push(vec![
                    opt(&sp.display_name),
                    opt(&sp.app_id),
                    opt(&sp.service_principal_type),
                    yes_no(sp.account_enabled),
                    yes_no(Some(sp.is_integrated_app())),
                ]);
            }
            table
        }
        Section::Domains => {
            let domains: Vec<Domain> = parse(section, data)?;
            let mut table = Table::new(&["Domain", "Default", "Verified", "Authentication", "Services"]);
            for d in &domains {
                table.push(vec![
                    d.id.clone(),
                    yes_no(Some(d.is_default)),
                    yes_no(Some(d.is_verified)),
                    opt(&d.authentication_type),
                    d.supported_services.join(", "),
                ]);
            }
            table
        }
        Section::Organization => {
            let org: Organization = parse(section, data)?;
            let mut table = Table::new(&["Property", "Value"]);
            table.push(vec!["Name".to_string(), opt(&org.display_name)]);
            table.push(vec!["Tenant ID".to_string(), org.id.clone()]);
            table.push(vec!["Country".to_string(), opt(&org.country_letter_code)]);
            if let Some(default) = org.verified_domains.iter().find(|d| d.is_default) {
                table.push(vec!["Default domain".to_string(), default.name.clone()]);
            }
            table.push(vec!["Verified domains".to_string(), org.verified_domains.len().to_string()]);
            table
        }
        Section::Licenses => {
            let skus: Vec<SubscribedSku> = parse(section, data)?;
            let mut table = Table::new(&["SKU", "Consumed", "Enabled", "Available", "Used"]);
            for usage in insights::license_usage(&skus) {
                table.push(vec![
                    usage.sku,
                    usage.consumed.to_string(),
                    usage.enabled.to_string(),
                    usage.available.to_string(),
                    format!("{:.0}%", usage.percent),
                ]);
            }
            table
        }
        Section::SecureScore => {
            let mut scores: Vec<SecureScore> = parse(section, data)?;
            scores.sort_by(|a, b| b.created_date_time.cmp(&a.created_date_time));
            let mut table = Table::new(&["Date", "Score", "Max", "Percent", "Licensed Users"]);
            for s in &scores {
                table.push(vec![
                    date(&s.created_date_time),
                    format!("{:.1}", s.current_score),
                    format!("{:.0}", s.max_score),
                    format!("{:.1}%", s.percent()),
                    s.licensed_user_count.map(|c| c.to_string()).unwrap_or_default(),
                ]);
            }
            table
        }
        Section::SecureScoreControls => {
            let profiles: Vec<SecureScoreControlProfile> = parse(section, data)?;
            let mut table = Table::new(&["Rank", "Control", "Category", "Max", "User Impact", "Cost"]);
            let mut sorted: Vec<&SecureScoreControlProfile> =
                profiles.iter().filter(|p| !p.deprecated).collect();
            sorted.sort_by_key(|p| p.rank.unwrap_or(i64::MAX));
            for p in sorted {
                table.push(vec![
                    p.rank.map(|r| r.to_string()).unwrap_or_default(),
                    p.title.clone().unwrap_or_else(|| p.id.clone()),
                    opt(&p.control_category),
                    format!("{:.0}", p.max_score),
                    opt(&p.user_impact),
                    opt(&p.implementation_cost),
                ]);
            }
            table
        }
        Section::ServiceHealth => {
            let mut services: Vec<ServiceHealth> = parse(section, data)?;
            services.sort_by(|a, b| a.is_operational().cmp(&b.is_operational()).then(a.service.cmp(&b.service)));
            let mut table = Table::new(&["Service", "Status"]);
            for s in &services {
                table.push(vec![s.service.clone(), s.status.clone()]);
            }
            table
        }
        Section::ServiceIssues => {
            let issues: Vec<ServiceHealthIssue> = parse(section, data)?;
            let mut table = Table::new(&["ID", "Service", "Title", "Classification", "Status", "Started"]);
            for i in &issues {
                table.push(vec![
                    i.id.clone(),
                    opt(&i.service),
                    opt(&i.title),
                    opt(&i.classification),
                    opt(&i.status),
                    date(&i.start_date_time),
                ]);
            }
            table
        }
        Section::MessageCenter => {
            let messages: Vec<ServiceUpdateMessage> = parse(section, data)?;
            let mut table = Table::new(&["ID", "Title", "Category", "Services", "Act By", "Updated"]);
            for m in &messages {
                table.push(vec![
                    m.id.clone(),
                    opt(&m.title),
                    opt(&m.category),
                    m.services.join(", "),
                    date(&m.action_required_by_date_time),
                    date(&m.last_modified_date_time),
                ]);
            }
            table
        }
        Section::SignIns => {
            let sign_ins: Vec<SignIn> = parse(section, data)?;
            let mut table = Table::new(&["Time", "User", "App", "IP", "Location", "Result"]);
            for s in &sign_ins {
                let location = s
                    .location
                    .as_ref()
                    .map(|l| {
                        [&l.city, &l.country_or_region]
                            .into_iter()
                            .flatten()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                let result = if s.succeeded() {
                    "Success".to_string()
                } else {
                    s.status
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| format!("Error {}", s.status.error_code))
                };
                table.push(vec![
                    opt(&s.created_date_time),
                    opt(&s.user_principal_name),
                    opt(&s.app_display_name),
                    opt(&s.ip_address),
                    location,
                    result,
                ]);
            }
            table
        }
        Section::AuditLogs => {
            let audits: Vec<DirectoryAudit> = parse(section, data)?;
            let mut table = Table::new(&["Time", "Activity", "Category", "Result", "Initiated By"]);
            for a in &audits {
                table.push(vec![
                    opt(&a.activity_date_time),
                    opt(&a.activity_display_name),
                    opt(&a.category),
                    opt(&a.result),
                    a.initiator().unwrap_or_default(),
                ]);
            }
            table
        }
        Section::Sites => {
            let sites: Vec<Site> = parse(section, data)?;
            let mut table = Table::new(&["Title", "URL", "Last Modified"]);
            for s in &sites {
                table.push(vec![
                    s.title().to_string(),
                    opt(&s.web_url),
                    date(&s.last_modified_date_time),
                ]);
            }
            table
        }
        Section::Teams => {
            let teams: Vec<Team> = parse(section, data)?;
            let mut table = Table::new(&["Team", "Visibility", "Mail", "Created"]);
            for t in &teams {
                table.push(vec![
                    opt(&t.display_name),
                    opt(&t.visibility),
                    opt(&t.mail),
                    date(&t.created_date_time),
                ]);
            }
            table
        }
        Section::Mailboxes => {
            let mailboxes: Vec<MailboxUsage> = parse(section, data)?;
            let mut table = Table::new(&["Mailbox", "Items", "Used", "Quota", "Archive", "Last Activity"]);
            for m in mailboxes.iter().filter(|m| !m.is_deleted) {
                table.push(vec![
                    m.user_principal_name.clone(),
                    m.item_count.to_string(),
                    format_bytes(m.storage_used_bytes),
                    m.quota_percent().map(|p| format!("{:.0}%", p)).unwrap_or_default(),
                    yes_no(Some(m.has_archive)),
                    opt(&m.last_activity_date),
                ]);
            }
            table
        }
        Section::SensitivityLabels => {
            let labels: Vec<SensitivityLabel> = parse(section, data)?;
            let mut table = Table::new(&["Label", "Priority", "Active", "Applies To", "Description"]);
            for l in &labels {
                table.push(vec![
                    l.name.clone(),
                    l.sensitivity.map(|s| s.to_string()).unwrap_or_default(),
                    yes_no(l.is_active),
                    l.content_formats.join(", "),
                    opt(&l.description),
                ]);
            }
            table
        }
    };
    Ok(table)
}

/// Days ahead to warn about app secrets and certificates.
const CREDENTIAL_WARNING_DAYS: i64 = 30;

/// Send-quota percentage that counts as nearly full.
const MAILBOX_QUOTA_WARNING: f64 = 90.0;

/// One-line roll-ups printed under a section table.
pub fn section_highlights(section: Section, data: &Value, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    match section {
        Section::Users => {
            let users: Vec<User> = parse(section, data)?;
            let c = insights::user_counts(&users);
            lines.push(format!(
                "{} users: {} enabled, {} disabled, {} guests, {} unlicensed",
                c.total, c.enabled, c.disabled, c.guests, c.unlicensed
            ));
        }
        Section::Devices => {
            let devices: Vec<Device> = parse(section, data)?;
            let c = insights::device_compliance(&devices);
            lines.push(format!(
                "Compliance: {} compliant, {} non-compliant, {} unknown; {} managed",
                c.compliant, c.noncompliant, c.unknown, c.managed
            ));
        }
        Section::Applications => {
            let apps: Vec<Application> = parse(section, data)?;
            for cred in insights::expiring_credentials(&apps, CREDENTIAL_WARNING_DAYS, now) {
                let kind = match cred.kind {
                    CredentialKind::Secret => "secret",
                    CredentialKind::Certificate => "certificate",
                };
                let when = if cred.days_left < 0 {
                    format!("expired {}", cred.expires.format("%Y-%m-%d"))
                } else {
                    format!("expires {} ({}d)", cred.expires.format("%Y-%m-%d"), cred.days_left)
                };
                lines.push(format!(
                    "{} {} '{}' {}",
                    cred.application,
                    kind,
                    cred.credential.as_deref().unwrap_or("unnamed"),
                    when
                ));
            }
        }
        Section::ServiceHealth => {
            let services: Vec<ServiceHealth> = parse(section, data)?;
            let counts = insights::service_status_counts(&services);
            let parts: Vec<String> = counts.iter().map(|(status, n)| format!("{} {}", n, status)).collect();
            if !parts.is_empty() {
                lines.push(format!("Status: {}", parts.join(", ")));
            }
            let degraded = insights::degraded_services(&services);
            if !degraded.is_empty() {
                let names: Vec<&str> = degraded.iter().map(|s| s.service.as_str()).collect();
                lines.push(format!("Attention: {}", names.join(", ")));
            }
        }
        Section::Mailboxes => {
            let mailboxes: Vec<MailboxUsage> = parse(section, data)?;
            for (mailbox, percent) in insights::mailboxes_near_quota(&mailboxes, MAILBOX_QUOTA_WARNING) {
                lines.push(format!("{} at {:.0}% of send quota", mailbox.user_principal_name, percent));
            }
        }
        _ => {}
    }
    Ok(lines)
}

fn users_table(users: &[User], filter: UserFilter, now: DateTime<Utc>) -> Table {
    let mut table = Table::new(&["Name", "UPN", "Type", "Enabled", "Licensed", "Last Sign-In"]);
    for u in insights::filter_users(users, filter, None, now) {
        table.push(vec![
            u.name().to_string(),
            u.user_principal_name.clone(),
            u.kind().to_string(),
            yes_no(Some(u.is_enabled())),
            yes_no(Some(u.is_licensed())),
            u.last_sign_in()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "Never".to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_users_table_filtered_and_sorted() {
        let data = json!([
            {"id": "2", "displayName": "Megan Bowen", "userPrincipalName": "meganb@contoso.com", "accountEnabled": true},
            {"id": "1", "displayName": "Adele Vance", "userPrincipalName": "adelev@contoso.com", "accountEnabled": false}
        ]);
        let table = section_table(Section::Users, &data, None, now()).unwrap();
        let text = table.render();
        let rows: Vec<&str> = text.lines().skip(2).collect();
        assert!(rows[0].starts_with("Adele Vance"));
        assert!(rows[1].starts_with("Megan Bowen"));

        let disabled = section_table(Section::Users, &data, Some(UserFilter::Disabled), now()).unwrap();
        assert_eq!(disabled.len(), 1);
    }

    #[test]
    fn test_license_table_uses_utilisation() {
        let data = json!([
            {"skuId": "a", "skuPartNumber": "EMS", "consumedUnits": 1, "prepaidUnits": {"enabled": 10}},
            {"skuId": "b", "skuPartNumber": "SPE_E3", "consumedUnits": 9, "prepaidUnits": {"enabled": 10}}
        ]);
        let text = section_table(Section::Licenses, &data, None, now()).unwrap().render();
        let first = text.lines().nth(2).unwrap();
        assert!(first.starts_with("SPE_E3"));
        assert!(first.ends_with("90%"));
    }

    #[test]
    fn test_highlights() {
        let users = json!([
            {"id": "1", "userPrincipalName": "a@contoso.com", "accountEnabled": true, "userType": "Guest"},
            {"id": "2", "userPrincipalName": "b@contoso.com", "accountEnabled": false}
        ]);
        let lines = section_highlights(Section::Users, &users, now()).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("2 users: 1 enabled, 1 disabled, 1 guests"));

        let apps = json!([
            {"id": "a", "displayName": "Payroll",
             "passwordCredentials": [{"displayName": "ci", "endDateTime": "2024-06-11T00:00:00Z"}],
             "keyCredentials": [{"displayName": "old", "endDateTime": "2023-01-01T00:00:00Z"}]},
            {"id": "b", "displayName": "Later",
             "passwordCredentials": [{"displayName": "x", "endDateTime": "2030-01-01T00:00:00Z"}]}
        ]);
        let lines = section_highlights(Section::Applications, &apps, now()).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("certificate 'old' expired 2023-01-01"));
        assert!(lines[1].contains("secret 'ci' expires 2024-06-11 (10d)"));

        let health = json!([
            {"id": "x", "service": "Exchange Online", "status": "serviceDegradation"},
            {"id": "y", "service": "SharePoint Online", "status": "serviceOperational"}
        ]);
        let lines = section_highlights(Section::ServiceHealth, &health, now()).unwrap();
        assert_eq!(lines[1], "Attention: Exchange Online");

        assert!(section_highlights(Section::Domains, &json!([]), now()).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_section_is_an_error() {
        assert!(section_table(Section::Groups, &json!({"not": "a list"}), None, now()).is_err());
    }
}
