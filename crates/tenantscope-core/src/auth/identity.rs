//! OAuth2 flows against the Microsoft identity platform (v2.0 endpoints).
//!
//! Interactive admins sign in with the device authorization grant;
//! unattended runs use client credentials. Access tokens are renewed with
//! the refresh token when one was issued.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::SessionData;

/// Identity platform authority host
pub const AUTHORITY_BASE_URL: &str = "https://login.microsoftonline.com";

/// Scope for app-only Graph access with client credentials.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Polling interval when the server does not send one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Added to the interval on `slow_down`, per RFC 8628.
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in was declined")]
    Declined,

    #[error("The device code expired before sign-in completed")]
    Expired,

    #[error("Identity platform rejected the request: {code}: {description}")]
    Rejected { code: String, description: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Device authorization response shown to the admin.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// What to do after a token poll that did not return a token.
#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Pending,
    SlowDown,
}

fn classify_poll_error(err: TokenErrorResponse) -> std::result::Result<PollState, AuthError> {
    match err.error.as_str() {
        "authorization_pending" => Ok(PollState::Pending),
        "slow_down" => Ok(PollState::SlowDown),
        "authorization_declined" | "access_denied" => Err(AuthError::Declined),
        "expired_token" | "code_expired" => Err(AuthError::Expired),
        _ => Err(AuthError::Rejected {
            code: err.error,
            description: err.error_description.unwrap_or_default(),
        }),
    }
}

pub struct IdentityClient {
    client: Client,
    authority: String,
    tenant: String,
    client_id: String,
}

impl IdentityClient {
    pub fn new(tenant: &str, client_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            authority: AUTHORITY_BASE_URL.to_string(),
            tenant: tenant.to_string(),
            client_id: client_id.to_string(),
        })
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.authority, self.tenant, name)
    }

    /// Start the device authorization grant.
    pub async fn start_device_code(&self, scopes: &[String]) -> Result<DeviceCode> {
        let scope = scopes.join(" ");
        let response = self
            .client
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(AuthError::from)
            .context("Failed to request device code")?;

        let status = response.status();
        let text = response.text().await.map_err(AuthError::from)?;
        if !status.is_success() {
            return Err(Self::error_from_body(&text).into());
        }
        serde_json::from_str(&text)
            .map_err(|e| AuthError::InvalidResponse(format!("device code response: {}", e)).into())
    }

    /// Poll the token endpoint until the admin completes sign-in.
    pub async fn poll_device_code(&self, code: &DeviceCode, scopes: &[String]) -> Result<SessionData> {
        let mut interval = code.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(code.expires_in);

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Expired.into());
            }

            let params = [
                ("grant_type", DEVICE_CODE_GRANT),
                ("client_id", self.client_id.as_str()),
                ("device_code", code.device_code.as_str()),
            ];
            match self.token_request(&params).await? {
                Ok(token) => {
                    info!("Device code sign-in completed");
                    return Ok(self.session_from(token, scopes));
                }
                Err(err) => match classify_poll_error(err)? {
                    PollState::Pending => debug!("Waiting for sign-in"),
                    PollState::SlowDown => {
                        interval += SLOW_DOWN_INCREMENT_SECS;
                        debug!(interval = interval, "Identity platform asked to slow down");
                    }
                },
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<SessionData> {
        let scope = scopes.join(" ");
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        match self.token_request(&params).await? {
            Ok(token) => {
                debug!("Access token refreshed");
                Ok(self.session_from(token, scopes))
            }
            Err(err) => Err(Self::rejected(err).into()),
        }
    }

    /// App-only token using a client secret.
    pub async fn client_credentials(&self, client_secret: &str) -> Result<SessionData> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", client_secret),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];
        match self.token_request(&params).await? {
            Ok(token) => Ok(self.session_from(token, &[GRAPH_DEFAULT_SCOPE.to_string()])),
            Err(err) => Err(Self::rejected(err).into()),
        }
    }

    /// Outer error: transport or unparseable body. Inner error: OAuth error reply.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<std::result::Result<TokenResponse, TokenErrorResponse>> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .form(params)
            .send()
            .await
            .map_err(AuthError::from)
            .context("Failed to reach token endpoint")?;

        let status = response.status();
        let text = response.text().await.map_err(AuthError::from)?;
        if status.is_success() {
            let token = serde_json::from_str(&text)
                .map_err(|e| AuthError::InvalidResponse(format!("token response: {}", e)))?;
            Ok(Ok(token))
        } else {
            let err = serde_json::from_str(&text).map_err(|_| {
                AuthError::InvalidResponse(format!("token endpoint returned {}", status))
            })?;
            Ok(Err(err))
        }
    }

    fn rejected(err: TokenErrorResponse) -> AuthError {
        AuthError::Rejected {
            code: err.error,
            description: err.error_description.unwrap_or_default(),
        }
    }

    fn error_from_body(text: &str) -> AuthError {
        match serde_json::from_str::<TokenErrorResponse>(text) {
            Ok(err) => Self::rejected(err),
            Err(_) => AuthError::InvalidResponse(text.chars().take(200).collect()),
        }
    }

    fn session_from(&self, token: TokenResponse, requested: &[String]) -> SessionData {
        let now = Utc::now();
        let scopes = match token.scope {
            Some(ref granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => requested.to_vec(),
        };
        SessionData {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
            account: None,
            tenant_id: self.tenant.clone(),
            scopes,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_error(code: &str) -> TokenErrorResponse {
        TokenErrorResponse {
            error: code.to_string(),
            error_description: Some(format!("AADSTS: {}", code)),
        }
    }

    #[test]
    fn test_classify_poll_errors() {
        assert_eq!(classify_poll_error(poll_error("authorization_pending")).unwrap(), PollState::Pending);
        assert_eq!(classify_poll_error(poll_error("slow_down")).unwrap(), PollState::SlowDown);
        assert!(matches!(classify_poll_error(poll_error("authorization_declined")), Err(AuthError::Declined)));
        assert!(matches!(classify_poll_error(poll_error("expired_token")), Err(AuthError::Expired)));
        match classify_poll_error(poll_error("invalid_grant")) {
            Err(AuthError::Rejected { code, description }) => {
                assert_eq!(code, "invalid_grant");
                assert!(description.contains("invalid_grant"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_endpoints() {
        let client = IdentityClient::new("contoso.onmicrosoft.com", "app-id").unwrap();
        assert_eq!(
            client.endpoint("devicecode"),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/devicecode"
        );
        let local = client.with_authority("http://127.0.0.1:1/");
        assert_eq!(local.endpoint("token"), "http://127.0.0.1:1/contoso.onmicrosoft.com/oauth2/v2.0/token");
    }

    #[test]
    fn test_session_from_token_response() {
        let client = IdentityClient::new("tenant", "app").unwrap();
        let token: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","scope":"User.Read.All AuditLog.Read.All","expires_in":3599,
                "access_token":"at","refresh_token":"rt"}"#,
        )
        .unwrap();
        let session = client.session_from(token, &["ignored".to_string()]);
        assert_eq!(session.access_token, "at");
        assert_eq!(session.refresh_token.as_deref(), Some("rt"));
        assert_eq!(session.scopes, vec!["User.Read.All", "AuditLog.Read.All"]);
        assert!(!session.is_expired());
        assert!(session.minutes_until_expiry() >= 58);
    }

    #[test]
    fn test_parse_device_code_response() {
        let code: DeviceCode = serde_json::from_str(
            r#"{"user_code":"ABCD-EFGH","device_code":"dc","verification_uri":"https://microsoft.com/devicelogin",
                "expires_in":900,"interval":5,"message":"To sign in, use a web browser..."}"#,
        )
        .unwrap();
        assert_eq!(code.user_code, "ABCD-EFGH");
        assert_eq!(code.interval, Some(5));
    }
}
