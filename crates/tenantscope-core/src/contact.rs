//! Support requests through the Web3Forms relay.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const WEB3FORMS_URL: &str = "https://api.web3forms.com/submit";

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SupportRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl SupportRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Name is required");
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => bail!("'{}' is not a valid email address", email),
        }
        if self.message.trim().is_empty() {
            bail!("Message is required");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Submission<'a> {
    access_key: &'a str,
    #[serde(flatten)]
    request: &'a SupportRequest,
    from_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

pub struct ContactClient {
    client: Client,
    endpoint: String,
    access_key: String,
}

impl ContactClient {
    pub fn new(access_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: WEB3FORMS_URL.to_string(),
            access_key: access_key.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Submit the request. A reply with `success: false` is returned as-is,
    /// not as an error.
    pub async fn submit(&self, request: &SupportRequest) -> Result<SubmitResponse> {
        request.validate()?;
        let body = Submission {
            access_key: &self.access_key,
            request,
            from_name: crate::config::APP_NAME,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to reach the contact form service")?;

        let status = response.status();
        let text = response.text().await.context("Failed to read contact form response")?;
        debug!(status = %status, "Contact form submitted");

        match serde_json::from_str::<SubmitResponse>(&text) {
            Ok(reply) => {
                if !reply.success {
                    warn!(message = %reply.message, "Contact form rejected");
                }
                Ok(reply)
            }
            Err(_) if !status.is_success() => {
                bail!("Contact form service returned {}", status)
            }
            Err(e) => Err(e).context("Invalid contact form response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SupportRequest {
        SupportRequest {
            name: "Adele Vance".to_string(),
            email: "adelev@contoso.com".to_string(),
            subject: "Sign-in logs empty".to_string(),
            message: "The sign-in section shows no entries.".to_string(),
        }
    }

    #[test]
    fn test_validate() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.email = "adelev".to_string();
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.message = "   ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.name.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_submission_shape() {
        let req = request();
        let body = Submission {
            access_key: "key-123",
            request: &req,
            from_name: "tenantscope",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["access_key"], "key-123");
        assert_eq!(json["email"], "adelev@contoso.com");
        assert_eq!(json["subject"], "Sign-in logs empty");
        assert!(json.get("request").is_none());
    }

    #[test]
    fn test_parse_reply() {
        let ok: SubmitResponse =
            serde_json::from_str(r#"{"success":true,"message":"Email sent successfully!","data":{}}"#).unwrap();
        assert!(ok.success);
        let rejected: SubmitResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!rejected.success);
        assert!(rejected.message.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_not_sent() {
        let client = ContactClient::new("key").unwrap().with_endpoint("http://127.0.0.1:9/submit");
        let mut bad = request();
        bad.email = "nobody".to_string();
        let err = client.submit(&bad).await.unwrap_err();
        assert!(err.to_string().contains("not a valid email"));
    }
}
