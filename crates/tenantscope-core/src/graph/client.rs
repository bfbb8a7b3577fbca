//! Client for the Microsoft Graph REST API.
//!
//! This module provides the `GraphClient` struct for making authenticated
//! requests against Graph v1.0 and beta, following `@odata.nextLink` paging
//! and backing off on throttling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{
    parse_mailbox_usage_csv, Application, Device, DirectoryAudit, Domain, Group, MailboxUsage,
    ODataPage, Organization, SecureScore, SecureScoreControlProfile, SensitivityLabel,
    ServiceHealth, ServiceHealthIssue, ServicePrincipal, ServiceUpdateMessage, SignIn, Site,
    SubscribedSku, Team, User,
};

use super::{is_permission_denied, GraphError};

// ============================================================================
// Constants
// ============================================================================

/// Graph host; the API version is appended per request.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for throttled (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds when Graph sends no Retry-After.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound on a server-requested Retry-After.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Stop following nextLink after this many pages.
const MAX_PAGES: usize = 50;

/// Page size for directory collections.
const DIRECTORY_PAGE_SIZE: u32 = 999;

const USER_SELECT: &str = "id,displayName,userPrincipalName,mail,accountEnabled,userType,jobTitle,\
department,usageLocation,createdDateTime,onPremisesSyncEnabled,assignedLicenses";

/// Graph sends `Retry-After` in seconds. HTTP dates are not used by Graph
/// and fall back to exponential backoff.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    Beta,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1.0",
            ApiVersion::Beta => "beta",
        }
    }
}

enum Attempt {
    Done(Response),
    Throttled(Option<Duration>),
}

/// Graph API client.
/// Clone is cheap - reqwest::Client and the token are reference counted.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: Arc<String>,
    token: Option<Arc<String>>,
}

impl GraphClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: Arc::new(GRAPH_BASE_URL.to_string()),
            token: None,
        })
    }

    /// Point the client at another host (national clouds, local mocks).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Arc::new(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: Arc<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token),
        }
    }

    /// Absolute URL for a Graph path. Absolute inputs (nextLink) pass through.
    pub fn url(&self, path: &str, version: ApiVersion) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!(
                "{}/{}/{}",
                self.base_url,
                version.as_str(),
                path.trim_start_matches('/')
            )
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    fn retry_after(response: &Response) -> Option<Duration> {
        response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
    }

    /// Returns the response on success, signals a retry on 429, errors otherwise.
    async fn check_response_for_retry(response: Response) -> Result<Attempt> {
        let status = response.status();
        if status.is_success() {
            Ok(Attempt::Done(response))
        } else if status.as_u16() == 429 {
            Ok(Attempt::Throttled(Self::retry_after(&response)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GraphError::from_status(status, &body).into())
        }
    }

    async fn send_get(&self, url: &str) -> Result<Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(GraphError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Throttled(retry_after) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(GraphError::RateLimited.into());
                    }
                    let delay = retry_after.unwrap_or(Duration::from_millis(backoff_ms));
                    warn!(url = url, retry = retries, delay_ms = delay.as_millis() as u64, "Throttled by Graph, backing off");
                    tokio::time::sleep(delay).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, version: ApiVersion) -> Result<T> {
        let url = self.url(path, version);
        let response = self.send_get(&url).await?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        serde_json::from_str(&text).map_err(|e| {
            GraphError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)).into()
        })
    }

    pub async fn get_text(&self, path: &str, version: ApiVersion) -> Result<String> {
        let url = self.url(path, version);
        let response = self.send_get(&url).await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))
    }

    /// Fetch only the first page of a collection (log endpoints are unbounded).
    pub async fn get_page<T: DeserializeOwned>(&self, path: &str, version: ApiVersion) -> Result<Vec<T>> {
        let page: ODataPage<T> = self.get_json(path, version).await?;
        Ok(page.value)
    }

    /// Fetch a collection, following `@odata.nextLink` up to `MAX_PAGES` pages.
    pub async fn get_collection<T: DeserializeOwned>(&self, path: &str, version: ApiVersion) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path, version));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: ODataPage<T> = self.get_json(&url, version).await?;
            items.extend(page.value);
            pages += 1;
            if pages >= MAX_PAGES {
                if page.next_link.is_some() {
                    warn!(path = path, pages = pages, items = items.len(), "Page limit reached, result truncated");
                }
                break;
            }
            next = page.next_link;
        }

        debug!(path = path, pages = pages, count = items.len(), "Collection fetched");
        Ok(items)
    }

    // ===== Directory =====

    /// Signed-in account, used to show who is logged in.
    pub async fn fetch_me(&self) -> Result<User> {
        self.get_json("me?$select=id,displayName,userPrincipalName,mail", ApiVersion::V1)
            .await
            .context("Failed to fetch signed-in user")
    }

    /// Fetch all users. Sign-in activity needs AuditLog.Read.All and a P1
    /// license; without it the list is fetched again without that column.
    pub async fn fetch_users(&self) -> Result<Vec<User>> {
        let with_activity = format!(
            "users?$select={},signInActivity&$top={}",
            USER_SELECT, DIRECTORY_PAGE_SIZE
        );
        match self.get_collection(&with_activity, ApiVersion::V1).await {
            Ok(users) => Ok(users),
            Err(e) if is_permission_denied(&e) => {
                warn!(error = %e, "Sign-in activity not readable, fetching users without it");
                let plain = format!("users?$select={}&$top={}", USER_SELECT, DIRECTORY_PAGE_SIZE);
                self.get_collection(&plain, ApiVersion::V1)
                    .await
                    .context("Failed to fetch users")
            }
            Err(e) => Err(e.context("Failed to fetch users")),
        }
    }

    pub async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let path = format!(
            "groups?$select=id,displayName,description,mail,mailEnabled,securityEnabled,groupTypes,\
visibility,createdDateTime,resourceProvisioningOptions&$top={}",
            DIRECTORY_PAGE_SIZE
        );
        self.get_collection(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch groups")
    }

    pub async fn fetch_devices(&self) -> Result<Vec<Device>> {
        let path = format!(
            "devices?$select=id,displayName,operatingSystem,operatingSystemVersion,accountEnabled,\
isCompliant,isManaged,trustType,approximateLastSignInDateTime&$top={}",
            DIRECTORY_PAGE_SIZE
        );
        self.get_collection(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch devices")
    }

    pub async fn fetch_applications(&self) -> Result<Vec<Application>> {
        let path = format!(
            "applications?$select=id,appId,displayName,signInAudience,createdDateTime,\
passwordCredentials,keyCredentials&$top={}",
            DIRECTORY_PAGE_SIZE
        );
        self.get_collection(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch applications")
    }

    pub async fn fetch_service_principals(&self) -> Result<Vec<ServicePrincipal>> {
        let path = format!(
            "servicePrincipals?$select=id,appId,displayName,servicePrincipalType,accountEnabled,\
appOwnerOrganizationId,tags&$top={}",
            DIRECTORY_PAGE_SIZE
        );
        self.get_collection(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch service principals")
    }

    pub async fn fetch_domains(&self) -> Result<Vec<Domain>> {
        self.get_collection("domains", ApiVersion::V1)
            .await
            .context("Failed to fetch domains")
    }

    pub async fn fetch_organization(&self) -> Result<Organization> {
        let orgs: Vec<Organization> = self
            .get_page("organization", ApiVersion::V1)
            .await
            .context("Failed to fetch organization")?;
        orgs.into_iter()
            .next()
            .ok_or_else(|| GraphError::InvalidResponse("No organization found".to_string()).into())
    }

    pub async fn fetch_subscribed_skus(&self) -> Result<Vec<SubscribedSku>> {
        self.get_collection("subscribedSkus", ApiVersion::V1)
            .await
            .context("Failed to fetch subscribed SKUs")
    }

    // ===== Security =====

    /// Most recent Secure Score snapshots, newest first.
    pub async fn fetch_secure_scores(&self, top: u32) -> Result<Vec<SecureScore>> {
        let path = format!("security/secureScores?$top={}", top);
        self.get_page(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch secure scores")
    }

    pub async fn fetch_secure_score_profiles(&self) -> Result<Vec<SecureScoreControlProfile>> {
        self.get_collection("security/secureScoreControlProfiles", ApiVersion::V1)
            .await
            .context("Failed to fetch secure score control profiles")
    }

    // ===== Service announcements =====

    pub async fn fetch_service_health(&self) -> Result<Vec<ServiceHealth>> {
        self.get_collection("admin/serviceAnnouncement/healthOverviews", ApiVersion::V1)
            .await
            .context("Failed to fetch service health")
    }

    pub async fn fetch_service_issues(&self) -> Result<Vec<ServiceHealthIssue>> {
        self.get_collection(
            "admin/serviceAnnouncement/issues?$filter=isResolved eq false",
            ApiVersion::V1,
        )
        .await
        .context("Failed to fetch service health issues")
    }

    pub async fn fetch_message_center(&self, top: u32) -> Result<Vec<ServiceUpdateMessage>> {
        let path = format!(
            "admin/serviceAnnouncement/messages?$orderby=lastModifiedDateTime desc&$top={}",
            top
        );
        self.get_page(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch message center posts")
    }

    // ===== Logs =====

    pub async fn fetch_sign_ins(&self, top: u32) -> Result<Vec<SignIn>> {
        let path = format!("auditLogs/signIns?$top={}", top);
        self.get_page(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch sign-in logs")
    }

    pub async fn fetch_directory_audits(&self, top: u32) -> Result<Vec<DirectoryAudit>> {
        let path = format!("auditLogs/directoryAudits?$top={}", top);
        self.get_page(&path, ApiVersion::V1)
            .await
            .context("Failed to fetch directory audits")
    }

    // ===== Collaboration =====

    pub async fn fetch_sites(&self) -> Result<Vec<Site>> {
        self.get_collection(
            "sites?search=*&$select=id,displayName,name,webUrl,createdDateTime,lastModifiedDateTime",
            ApiVersion::V1,
        )
        .await
        .context("Failed to fetch SharePoint sites")
    }

    pub async fn fetch_teams(&self) -> Result<Vec<Team>> {
        self.get_collection(
            "groups?$filter=resourceProvisioningOptions/Any(x:x eq 'Team')\
&$select=id,displayName,description,visibility,mail,createdDateTime",
            ApiVersion::V1,
        )
        .await
        .context("Failed to fetch teams")
    }

    /// Exchange mailbox usage for the last 7 days. The report endpoint
    /// redirects to a pre-authenticated CSV download.
    pub async fn fetch_mailbox_usage(&self) -> Result<Vec<MailboxUsage>> {
        let body = self
            .get_text("reports/getMailboxUsageDetail(period='D7')", ApiVersion::V1)
            .await
            .context("Failed to fetch mailbox usage report")?;
        parse_mailbox_usage_csv(&body).context("Failed to parse mailbox usage report")
    }

    // ===== Purview =====

    pub async fn fetch_sensitivity_labels(&self) -> Result<Vec<SensitivityLabel>> {
        self.get_collection(
            "security/informationProtection/sensitivityLabels",
            ApiVersion::Beta,
        )
        .await
        .context("Failed to fetch sensitivity labels")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, TestServer};

    #[test]
    fn test_url_building() {
        let client = GraphClient::new().unwrap();
        assert_eq!(
            client.url("users?$top=5", ApiVersion::V1),
            "https://graph.microsoft.com/v1.0/users?$top=5"
        );
        assert_eq!(
            client.url("/security/informationProtection/sensitivityLabels", ApiVersion::Beta),
            "https://graph.microsoft.com/beta/security/informationProtection/sensitivityLabels"
        );
        let next = "https://graph.microsoft.com/v1.0/users?$skiptoken=X";
        assert_eq!(client.url(next, ApiVersion::V1), next);
    }

    #[test]
    fn test_custom_base_url_and_token_sharing() {
        let client = GraphClient::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:8080/");
        assert_eq!(client.url("me", ApiVersion::V1), "http://127.0.0.1:8080/v1.0/me");

        let authed = client.with_token(Arc::new("abc".to_string()));
        let headers = authed.auth_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert!(client.auth_headers().unwrap().is_empty());
    }

    #[test]
    fn test_user_select_has_no_whitespace() {
        assert!(!USER_SELECT.contains(' '));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("3600"),
            Some(Duration::from_secs(MAX_RETRY_AFTER_SECS))
        );
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    fn throttled() -> Reply {
        Reply::json(429, r#"{"error":{"code":"TooManyRequests","message":"Slow down"}}"#)
            .header("Retry-After", "0")
    }

    #[tokio::test]
    async fn test_throttled_request_is_retried() {
        let server = TestServer::bind().await;
        let client = GraphClient::new().unwrap().with_base_url(server.base_url());
        let seen = server.serve(vec![
            throttled(),
            Reply::json(200, r#"{"id":"1","displayName":"Contoso"}"#),
        ]);

        let org: serde_json::Value = client.get_json("organization/1", ApiVersion::V1).await.unwrap();
        assert_eq!(org["displayName"], "Contoso");

        let seen = seen.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|line| line.starts_with("GET /v1.0/organization/1 ")));
    }

    #[tokio::test]
    async fn test_throttling_gives_up_after_retry_limit() {
        let server = TestServer::bind().await;
        let client = GraphClient::new().unwrap().with_base_url(server.base_url());
        let attempts = MAX_RATE_LIMIT_RETRIES as usize + 1;
        let seen = server.serve((0..attempts).map(|_| throttled()).collect());

        let err = client
            .get_json::<serde_json::Value>("users", ApiVersion::V1)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<GraphError>(), Some(GraphError::RateLimited)));
        assert_eq!(seen.await.unwrap().len(), attempts);
    }

    #[tokio::test]
    async fn test_collection_follows_next_link() {
        let server = TestServer::bind().await;
        let base = server.base_url().to_string();
        let client = GraphClient::new().unwrap().with_base_url(&base);
        let seen = server.serve(vec![
            Reply::json(
                200,
                format!(
                    r#"{{"value":[{{"id":"1"}},{{"id":"2"}}],"@odata.nextLink":"{}/v1.0/users?$skiptoken=p2"}}"#,
                    base
                ),
            ),
            Reply::json(200, r#"{"value":[{"id":"3"}]}"#),
        ]);

        let users: Vec<serde_json::Value> = client.get_collection("users?$top=2", ApiVersion::V1).await.unwrap();
        let ids: Vec<&str> = users.iter().filter_map(|u| u["id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let seen = seen.await.unwrap();
        assert!(seen[0].starts_with("GET /v1.0/users?$top=2 "));
        assert!(seen[1].starts_with("GET /v1.0/users?$skiptoken=p2 "));
    }

    #[tokio::test]
    async fn test_collection_stops_at_page_limit() {
        let server = TestServer::bind().await;
        let base = server.base_url().to_string();
        let client = GraphClient::new().unwrap().with_base_url(&base);
        let page = format!(
            r#"{{"value":[{{"id":"x"}}],"@odata.nextLink":"{}/v1.0/groups?$skiptoken=more"}}"#,
            base
        );
        let seen = server.serve((0..MAX_PAGES).map(|_| Reply::json(200, page.clone())).collect());

        let groups: Vec<serde_json::Value> = client.get_collection("groups", ApiVersion::V1).await.unwrap();
        assert_eq!(groups.len(), MAX_PAGES);
        assert_eq!(seen.await.unwrap().len(), MAX_PAGES);
    }
}
