use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// Keychain account prefix for the session vault passphrase.
const VAULT_ACCOUNT_PREFIX: &str = "session-vault";

pub struct CredentialStore;

impl CredentialStore {
    /// Store an app registration's client secret in the OS keychain
    pub fn store_client_secret(client_id: &str, secret: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, client_id)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(secret)
            .context("Failed to store client secret in keychain")?;
        Ok(())
    }

    /// Retrieve the client secret for an app registration
    pub fn get_client_secret(client_id: &str) -> Result<String> {
        let entry = Entry::new(APP_NAME, client_id)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve client secret from keychain")
    }

    pub fn delete_client_secret(client_id: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, client_id)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete client secret from keychain")?;
        Ok(())
    }

    pub fn has_client_secret(client_id: &str) -> bool {
        if let Ok(entry) = Entry::new(APP_NAME, client_id) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }

    /// Passphrase protecting the persisted session for a tenant, created on first use.
    pub fn vault_passphrase(tenant: &str) -> Result<String> {
        let account = format!("{}:{}", VAULT_ACCOUNT_PREFIX, tenant);
        let entry = Entry::new(APP_NAME, &account)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(passphrase) => Ok(passphrase),
            Err(keyring::Error::NoEntry) => {
                let passphrase = super::vault::generate_passphrase();
                entry
                    .set_password(&passphrase)
                    .context("Failed to store session passphrase in keychain")?;
                Ok(passphrase)
            }
            Err(e) => Err(e).context("Failed to read session passphrase from keychain"),
        }
    }
}
