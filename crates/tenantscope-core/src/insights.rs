//! Filtering, sorting and roll-ups over cached Graph data.
//!
//! Everything here is pure: callers pass the current time where it matters.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Duration, Utc};

use crate::models::{
    Application, Device, MailboxUsage, SecureScore, SecureScoreControlProfile, ServiceHealth,
    SubscribedSku, User, UserKind,
};
use crate::utils::{cmp_ignore_case, contains_ignore_case};

/// Days without a sign-in before an account counts as inactive.
pub const DEFAULT_INACTIVE_DAYS: i64 = 90;

/// Longest accepted inactivity window, about a century.
pub const MAX_INACTIVE_DAYS: i64 = 36_500;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Enabled,
    Disabled,
    Members,
    Guests,
    Unlicensed,
    /// No sign-in within the given number of days (or never).
    Inactive(i64),
}

impl UserFilter {
    pub fn matches(&self, user: &User, now: DateTime<Utc>) -> bool {
        match self {
            UserFilter::All => true,
            UserFilter::Enabled => user.is_enabled(),
            UserFilter::Disabled => !user.is_enabled(),
            UserFilter::Members => user.kind() == UserKind::Member,
            UserFilter::Guests => user.kind() == UserKind::Guest,
            UserFilter::Unlicensed => !user.is_licensed(),
            UserFilter::Inactive(days) => match user.last_sign_in() {
                Some(last) => match Duration::try_days(*days) {
                    Some(window) => now - last > window,
                    None => false,
                },
                None => true,
            },
        }
    }
}

impl FromStr for UserFilter {
    type Err = Error;

    /// Accepts `enabled`, `guests`, `inactive` or `inactive:30`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lower.as_str(), None),
        };
        match (name, arg) {
            ("all", None) => Ok(UserFilter::All),
            ("enabled", None) => Ok(UserFilter::Enabled),
            ("disabled", None) => Ok(UserFilter::Disabled),
            ("members" | "member", None) => Ok(UserFilter::Members),
            ("guests" | "guest", None) => Ok(UserFilter::Guests),
            ("unlicensed", None) => Ok(UserFilter::Unlicensed),
            ("inactive", None) => Ok(UserFilter::Inactive(DEFAULT_INACTIVE_DAYS)),
            ("inactive", Some(days)) => days
                .parse::<i64>()
                .ok()
                .filter(|d| (1..=MAX_INACTIVE_DAYS).contains(d))
                .map(UserFilter::Inactive)
                .ok_or_else(|| {
                    anyhow!(
                        "Invalid inactivity window '{}', expected 1 to {} days",
                        days,
                        MAX_INACTIVE_DAYS
                    )
                }),
            _ => Err(anyhow!("Unknown user filter '{}'", s)),
        }
    }
}

/// Users matching the filter and optional search text, sorted by name.
pub fn filter_users<'a>(
    users: &'a [User],
    filter: UserFilter,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<&'a User> {
    let query = search.map(str::to_lowercase).filter(|q| !q.is_empty());
    let mut result: Vec<&User> = users
        .iter()
        .filter(|u| filter.matches(u, now))
        .filter(|u| match query {
            Some(ref q) => user_matches_search(u, q),
            None => true,
        })
        .collect();
    result.sort_by(|a, b| {
        cmp_ignore_case(a.name(), b.name())
            .then_with(|| cmp_ignore_case(&a.user_principal_name, &b.user_principal_name))
    });
    result
}

fn user_matches_search(user: &User, query: &str) -> bool {
    contains_ignore_case(user.name(), query)
        || contains_ignore_case(&user.user_principal_name, query)
        || [&user.mail, &user.department, &user.job_title]
            .into_iter()
            .flatten()
            .any(|s| contains_ignore_case(s, query))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub guests: usize,
    pub unlicensed: usize,
}

pub fn user_counts(users: &[User]) -> UserCounts {
    users.iter().fold(UserCounts::default(), |mut counts, user| {
        counts.total += 1;
        if user.is_enabled() {
            counts.enabled += 1;
        } else {
            counts.disabled += 1;
        }
        if user.kind() == UserKind::Guest {
            counts.guests += 1;
        }
        if !user.is_licensed() {
            counts.unlicensed += 1;
        }
        counts
    })
}

// ============================================================================
// Licenses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LicenseUsage {
    pub sku: String,
    pub consumed: i64,
    pub enabled: i64,
    pub available: i64,
    pub percent: f64,
}

/// Per-SKU utilisation, most utilised first.
pub fn license_usage(skus: &[SubscribedSku]) -> Vec<LicenseUsage> {
    let mut usage: Vec<LicenseUsage> = skus
        .iter()
        .map(|sku| LicenseUsage {
            sku: sku.sku_part_number.clone(),
            consumed: sku.consumed_units,
            enabled: sku.prepaid_units.enabled,
            available: sku.available_units(),
            percent: sku.utilization_percent(),
        })
        .collect();
    usage.sort_by(|a, b| {
        b.percent
            .total_cmp(&a.percent)
            .then_with(|| a.sku.cmp(&b.sku))
    });
    usage
}

// ============================================================================
// Secure Score
// ============================================================================

/// Most recent snapshot by creation time.
pub fn latest_secure_score(scores: &[SecureScore]) -> Option<&SecureScore> {
    scores
        .iter()
        .max_by(|a, b| a.created_date_time.cmp(&b.created_date_time))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementAction {
    pub title: String,
    pub category: Option<String>,
    pub current: f64,
    pub max_score: f64,
    pub user_impact: Option<String>,
    pub implementation_cost: Option<String>,
}

impl ImprovementAction {
    pub fn points_available(&self) -> f64 {
        (self.max_score - self.current).max(0.0)
    }
}

/// Controls with points still to gain, largest gain first, then by
/// Microsoft's rank. Deprecated controls are skipped.
pub fn improvement_actions(
    latest: &SecureScore,
    profiles: &[SecureScoreControlProfile],
    limit: usize,
) -> Vec<ImprovementAction> {
    let mut actions: Vec<(Option<i64>, ImprovementAction)> = profiles
        .iter()
        .filter(|p| !p.deprecated)
        .map(|p| {
            let current = latest
                .control_scores
                .iter()
                .find(|c| c.control_name == p.id)
                .map(|c| c.score)
                .unwrap_or(0.0);
            let action = ImprovementAction {
                title: p.title.clone().unwrap_or_else(|| p.id.clone()),
                category: p.control_category.clone(),
                current,
                max_score: p.max_score,
                user_impact: p.user_impact.clone(),
                implementation_cost: p.implementation_cost.clone(),
            };
            (p.rank, action)
        })
        .filter(|(_, a)| a.points_available() > 0.0)
        .collect();

    actions.sort_by(|(rank_a, a), (rank_b, b)| {
        b.points_available()
            .total_cmp(&a.points_available())
            .then_with(|| rank_a.unwrap_or(i64::MAX).cmp(&rank_b.unwrap_or(i64::MAX)))
    });
    actions.into_iter().take(limit).map(|(_, a)| a).collect()
}

// ============================================================================
// Service health
// ============================================================================

/// Number of services per status value.
pub fn service_status_counts(services: &[ServiceHealth]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for service in services {
        *counts.entry(service.status.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn degraded_services(services: &[ServiceHealth]) -> Vec<&ServiceHealth> {
    let mut degraded: Vec<&ServiceHealth> =
        services.iter().filter(|s| !s.is_operational()).collect();
    degraded.sort_by(|a, b| cmp_ignore_case(&a.service, &b.service));
    degraded
}

// ============================================================================
// Devices
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCompliance {
    pub compliant: usize,
    pub noncompliant: usize,
    /// Devices Intune has no verdict for.
    pub unknown: usize,
    pub managed: usize,
}

pub fn device_compliance(devices: &[Device]) -> DeviceCompliance {
    devices.iter().fold(DeviceCompliance::default(), |mut c, device| {
        match device.is_compliant {
            Some(true) => c.compliant += 1,
            Some(false) => c.noncompliant += 1,
            None => c.unknown += 1,
        }
        if device.is_managed == Some(true) {
            c.managed += 1;
        }
        c
    })
}

// ============================================================================
// App registrations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Secret,
    Certificate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpiringCredential {
    pub application: String,
    pub credential: Option<String>,
    pub kind: CredentialKind,
    pub expires: DateTime<Utc>,
    /// Negative once expired.
    pub days_left: i64,
}

/// Secrets and certificates expiring within `within_days`, including those
/// already expired, soonest first.
pub fn expiring_credentials(
    apps: &[Application],
    within_days: i64,
    now: DateTime<Utc>,
) -> Vec<ExpiringCredential> {
    let horizon = now + Duration::days(within_days);
    let mut result = Vec::new();
    for app in apps {
        let name = app
            .display_name
            .clone()
            .or_else(|| app.app_id.clone())
            .unwrap_or_else(|| app.id.clone());
        let creds = app
            .password_credentials
            .iter()
            .map(|c| (CredentialKind::Secret, c))
            .chain(app.key_credentials.iter().map(|c| (CredentialKind::Certificate, c)));
        for (kind, cred) in creds {
            let Some(expires) = cred
                .end_date_time
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
            else {
                continue;
            };
            if expires <= horizon {
                result.push(ExpiringCredential {
                    application: name.clone(),
                    credential: cred.display_name.clone(),
                    kind,
                    expires,
                    days_left: (expires - now).num_days(),
                });
            }
        }
    }
    result.sort_by(|a, b| a.expires.cmp(&b.expires));
    result
}

// ============================================================================
// Mailboxes
// ============================================================================

/// Mailboxes at or above `threshold` percent of their send quota, fullest first.
pub fn mailboxes_near_quota(mailboxes: &[MailboxUsage], threshold: f64) -> Vec<(&MailboxUsage, f64)> {
    let mut result: Vec<(&MailboxUsage, f64)> = mailboxes
        .iter()
        .filter(|m| !m.is_deleted)
        .filter_map(|m| m.quota_percent().map(|p| (m, p)))
        .filter(|(_, p)| *p >= threshold)
        .collect();
    result.sort_by(|a, b| b.1.total_cmp(&a.1));
    result
}
