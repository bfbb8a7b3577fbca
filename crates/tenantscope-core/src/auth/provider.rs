use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use super::{IdentityClient, Session};

/// Hands out a usable access token, renewing the session when it is close
/// to expiry.
pub struct TokenProvider {
    identity: IdentityClient,
    session: Session,
    scopes: Vec<String>,
    client_secret: Option<String>,
}

impl TokenProvider {
    pub fn new(
        identity: IdentityClient,
        session: Session,
        scopes: Vec<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            identity,
            session,
            scopes,
            client_secret,
        }
    }

    pub async fn access_token(&mut self) -> Result<Arc<String>> {
        if let Some(data) = self.session.data.clone() {
            if !data.needs_refresh() {
                return Ok(Arc::new(data.access_token));
            }

            if let Some(refresh_token) = data.refresh_token.clone() {
                match self.identity.refresh(&refresh_token, &self.scopes).await {
                    Ok(mut renewed) => {
                        renewed.account = data.account.clone();
                        if renewed.refresh_token.is_none() {
                            renewed.refresh_token = Some(refresh_token);
                        }
                        let token = Arc::new(renewed.access_token.clone());
                        self.session.update(renewed);
                        return Ok(token);
                    }
                    Err(e) => warn!(error = %e, "Failed to refresh access token"),
                }
            }

            if !data.is_expired() {
                debug!("Using access token close to expiry");
                return Ok(Arc::new(data.access_token));
            }
        }

        if let Some(ref secret) = self.client_secret {
            let data = self.identity.client_credentials(secret).await?;
            let token = Arc::new(data.access_token.clone());
            self.session.update(data);
            return Ok(token);
        }

        bail!("Not signed in. Run `tenantscope login` first.")
    }
}
