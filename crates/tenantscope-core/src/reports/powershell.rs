//! PowerShell remediation scripts.
//!
//! Scripts are generated as text for an admin to review and run; nothing is
//! executed here. Each selected account gets exactly one action line.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Error, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationAction {
    BlockSignIn,
    RevokeSessions,
    RequirePasswordChange,
    EnableArchive,
    RemoveLicenses,
}

/// PowerShell module a script connects with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Module {
    MicrosoftGraph,
    ExchangeOnline,
}

impl RemediationAction {
    pub const ALL: [RemediationAction; 5] = [
        RemediationAction::BlockSignIn,
        RemediationAction::RevokeSessions,
        RemediationAction::RequirePasswordChange,
        RemediationAction::EnableArchive,
        RemediationAction::RemoveLicenses,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RemediationAction::BlockSignIn => "block-sign-in",
            RemediationAction::RevokeSessions => "revoke-sessions",
            RemediationAction::RequirePasswordChange => "require-password-change",
            RemediationAction::EnableArchive => "enable-archive",
            RemediationAction::RemoveLicenses => "remove-licenses",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RemediationAction::BlockSignIn => "Block sign-in",
            RemediationAction::RevokeSessions => "Revoke all refresh tokens and sessions",
            RemediationAction::RequirePasswordChange => "Require password change at next sign-in",
            RemediationAction::EnableArchive => "Enable archive mailbox",
            RemediationAction::RemoveLicenses => "Remove all assigned licenses",
        }
    }

    fn module(&self) -> Module {
        match self {
            RemediationAction::EnableArchive => Module::ExchangeOnline,
            _ => Module::MicrosoftGraph,
        }
    }

    fn connect_line(&self) -> &'static str {
        match self.module() {
            Module::MicrosoftGraph => match self {
                RemediationAction::RemoveLicenses => {
                    "Connect-MgGraph -Scopes 'User.ReadWrite.All','Organization.Read.All' -NoWelcome"
                }
                _ => "Connect-MgGraph -Scopes 'User.ReadWrite.All' -NoWelcome",
            },
            Module::ExchangeOnline => "Connect-ExchangeOnline -ShowBanner:$false",
        }
    }

    fn disconnect_line(&self) -> &'static str {
        match self.module() {
            Module::MicrosoftGraph => "Disconnect-MgGraph | Out-Null",
            Module::ExchangeOnline => "Disconnect-ExchangeOnline -Confirm:$false",
        }
    }

    fn action_line(&self, upn: &str) -> String {
        let id = quote(upn);
        match self {
            RemediationAction::BlockSignIn => {
                format!("Update-MgUser -UserId {} -AccountEnabled:$false", id)
            }
            RemediationAction::RevokeSessions => {
                format!("Revoke-MgUserSignInSession -UserId {} | Out-Null", id)
            }
            RemediationAction::RequirePasswordChange => format!(
                "Update-MgUser -UserId {} -PasswordProfile @{{ ForceChangePasswordNextSignIn = $true }}",
                id
            ),
            RemediationAction::EnableArchive => format!("Enable-Mailbox -Identity {} -Archive", id),
            RemediationAction::RemoveLicenses => format!(
                "Set-MgUserLicense -UserId {id} -AddLicenses @() -RemoveLicenses @((Get-MgUserLicenseDetail -UserId {id}).SkuId) | Out-Null",
                id = id
            ),
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RemediationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        RemediationAction::ALL
            .iter()
            .copied()
            .find(|a| a.key() == wanted)
            .ok_or_else(|| anyhow!("Unknown remediation action '{}'", s))
    }
}

/// PowerShell single-quoted string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Header comments must stay single-line.
fn comment_safe(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Selected accounts, trimmed. Every entry yields exactly one action line, so
/// blank entries and case-insensitive duplicates are rejected.
fn selected_accounts<S: AsRef<str>>(upns: &[S]) -> Result<Vec<&str>> {
    let mut selected: Vec<&str> = Vec::with_capacity(upns.len());
    for (i, upn) in upns.iter().enumerate() {
        let upn = upn.as_ref().trim();
        if upn.is_empty() {
            bail!("User {} of {} has an empty user principal name", i + 1, upns.len());
        }
        if selected.iter().any(|s| s.eq_ignore_ascii_case(upn)) {
            bail!("'{}' is selected more than once", upn);
        }
        selected.push(upn);
    }
    Ok(selected)
}

pub fn build_script<S: AsRef<str>>(
    action: RemediationAction,
    upns: &[S],
    tenant: Option<&str>,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let selected = selected_accounts(upns)?;
    if selected.is_empty() {
        bail!("No users selected for '{}'", action.description());
    }

    let mut lines: Vec<String> = vec![
        "# ----------------------------------------------------------------------".to_string(),
        format!("# Remediation: {}", action.description()),
        format!("# Tenant: {}", comment_safe(tenant.unwrap_or("(not set)"))),
        format!("# Generated: {}", generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        format!("# Selected users: {}", selected.len()),
        "# Review before running. Requires the Microsoft.Graph or ExchangeOnlineManagement module.".to_string(),
        "# ----------------------------------------------------------------------".to_string(),
        String::new(),
        "$ErrorActionPreference = 'Stop'".to_string(),
        action.connect_line().to_string(),
        String::new(),
    ];
    lines.extend(selected.iter().map(|upn| action.action_line(upn)));
    lines.push(String::new());
    lines.push(action.disconnect_line().to_string());

    let mut script = lines.join("\r\n");
    script.push_str("\r\n");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_one_line_per_selected_user() {
        let upns = ["adelev@contoso.com", "alexw@contoso.com", "meganb@contoso.com"];
        let script = build_script(RemediationAction::BlockSignIn, &upns, Some("contoso.com"), generated()).unwrap();

        assert!(script.contains("# Selected users: 3"));
        assert!(script.contains("# Generated: 2024-06-01T09:30:00Z"));
        for upn in upns {
            assert_eq!(script.lines().filter(|l| l.contains(upn)).count(), 1);
        }
        let action_lines = script.lines().filter(|l| l.starts_with("Update-MgUser")).count();
        assert_eq!(action_lines, 3);
        assert!(script.contains("Connect-MgGraph"));
        assert!(script.trim_end().ends_with("Disconnect-MgGraph | Out-Null"));
    }

    #[test]
    fn test_single_quotes_are_doubled() {
        let script = build_script(
            RemediationAction::RevokeSessions,
            &["o'brien@contoso.com"],
            None,
            generated(),
        )
        .unwrap();
        assert!(script.contains("Revoke-MgUserSignInSession -UserId 'o''brien@contoso.com' | Out-Null"));
        assert!(script.contains("# Tenant: (not set)"));
    }

    #[test]
    fn test_header_count_matches_selection() {
        let upns = vec![
            " adelev@contoso.com ".to_string(),
            "alexw@contoso.com".to_string(),
            "meganb@contoso.com".to_string(),
        ];
        let script = build_script(RemediationAction::EnableArchive, &upns[..], None, generated()).unwrap();
        assert!(script.contains("# Selected users: 3"));
        assert_eq!(script.lines().filter(|l| l.starts_with("Enable-Mailbox")).count(), 3);
        assert!(script.contains("Enable-Mailbox -Identity 'adelev@contoso.com' -Archive"));
        assert!(script.contains("Connect-ExchangeOnline"));
        assert!(script.contains("Disconnect-ExchangeOnline -Confirm:$false"));
    }

    #[test]
    fn test_duplicates_and_blanks_rejected() {
        let duplicates = ["a@contoso.com", "A@contoso.com", "b@contoso.com"];
        let err = build_script(RemediationAction::BlockSignIn, &duplicates, None, generated()).unwrap_err();
        assert!(err.to_string().contains("selected more than once"));

        let blank = ["a@contoso.com", "", "b@contoso.com"];
        let err = build_script(RemediationAction::BlockSignIn, &blank, None, generated()).unwrap_err();
        assert!(err.to_string().contains("User 2 of 3"));
    }

    #[test]
    fn test_remove_licenses_single_line() {
        let script =
            build_script(RemediationAction::RemoveLicenses, &["a@contoso.com"], None, generated()).unwrap();
        let lines: Vec<&str> = script.lines().filter(|l| l.contains("a@contoso.com")).collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Set-MgUserLicense"));
        assert!(script.contains("'Organization.Read.All'"));
    }

    #[test]
    fn test_password_profile_braces() {
        let script = build_script(
            RemediationAction::RequirePasswordChange,
            &["a@contoso.com"],
            None,
            generated(),
        )
        .unwrap();
        assert!(script.contains("-PasswordProfile @{ ForceChangePasswordNextSignIn = $true }"));
    }

    #[test]
    fn test_no_users_is_an_error() {
        let empty: [&str; 0] = [];
        assert!(build_script(RemediationAction::BlockSignIn, &empty, None, generated()).is_err());
        assert!(build_script(RemediationAction::BlockSignIn, &["  "], None, generated()).is_err());
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(
            "block_sign_in".parse::<RemediationAction>().unwrap(),
            RemediationAction::BlockSignIn
        );
        for action in RemediationAction::ALL {
            assert_eq!(action.key().parse::<RemediationAction>().unwrap(), action);
        }
        assert!("delete-user".parse::<RemediationAction>().is_err());
    }
}
