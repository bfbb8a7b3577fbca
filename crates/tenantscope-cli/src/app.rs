//! Command handlers.
//!
//! `App` owns the configuration and the shared section cache. Each command
//! records a navigation entry so the history mirrors what the admin looked at.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use tenantscope_core::auth::{
    CredentialStore, IdentityClient, Session, TokenProvider, Vault,
};
use tenantscope_core::contact::{ContactClient, SupportRequest};
use tenantscope_core::graph::GraphClient;
use tenantscope_core::insights::{self, UserFilter};
use tenantscope_core::models::{
    Device, Group, SecureScore, SecureScoreControlProfile, Site, SubscribedSku, User,
};
use tenantscope_core::refresh::{cached, Refresher, Section, SectionOutcome};
use tenantscope_core::reports::{self, RemediationAction};
use tenantscope_core::store::{FileStorage, LocalStorage, MemoryStorage, RemoteSync, SectionCache};
use tenantscope_core::utils::format_epoch_ms;
use tenantscope_core::Config;

use crate::cli::Commands;
use crate::ui::{section_highlights, section_table, Table};

pub struct App {
    config: Config,
    cache: Arc<SectionCache>,
}

/// Build the process-wide section cache from configuration.
fn build_cache(config: &Config) -> Arc<SectionCache> {
    SectionCache::global(|| {
        let storage: Arc<dyn LocalStorage> = match config.cache_dir() {
            Ok(dir) => Arc::new(FileStorage::new(&dir)),
            Err(e) => {
                warn!(error = %e, "No cache directory, keeping sections in memory");
                Arc::new(MemoryStorage::new())
            }
        };
        let remote = config.sync_url.as_deref().and_then(|url| {
            match RemoteSync::new(url, config.tenant_id.clone()) {
                Ok(remote) => Some(remote),
                Err(e) => {
                    warn!(error = %e, "Sync server disabled");
                    None
                }
            }
        });
        SectionCache::new(storage, remote)
    })
}

fn parse_sections(names: &[String]) -> Result<Vec<Section>> {
    if names.is_empty() {
        return Ok(Section::ALL.to_vec());
    }
    names.iter().map(|n| n.parse()).collect()
}

fn parse_filter(filter: Option<&str>) -> Result<Option<UserFilter>> {
    filter.map(str::parse).transpose()
}

impl App {
    pub fn new(config: Config) -> Self {
        let cache = build_cache(&config);
        Self { config, cache }
    }

    /// Wait for background sync pushes before the process exits.
    pub async fn finish(&self) {
        self.cache.settle().await;
    }

    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { client_secret } => self.login(client_secret).await,
            Commands::Logout { forget_secret } => self.logout(forget_secret).await,
            Commands::Status => self.status().await,
            Commands::Refresh { sections, force } => self.refresh(&sections, force).await,
            Commands::Show {
                section,
                filter,
                search,
                limit,
            } => self.show(&section, filter.as_deref(), search.as_deref(), limit).await,
            Commands::Summary => self.summary().await,
            Commands::Export {
                section,
                output,
                filter,
            } => self.export(&section, &output, filter.as_deref()).await,
            Commands::Script {
                action,
                users,
                filter,
                output,
            } => self.script(&action, &users, filter.as_deref(), &output).await,
            Commands::Clear { sections } => self.clear(&sections).await,
            Commands::History => self.history().await,
            Commands::Contact {
                name,
                email,
                subject,
                message,
            } => {
                self.contact(SupportRequest {
                    name,
                    email,
                    subject,
                    message,
                })
                .await
            }
        }
    }

    // ===== Authentication =====

    /// Session sealed with the tenant's keychain passphrase. Without a
    /// keychain the session only lives for this process.
    fn open_session(&self) -> Result<Session> {
        let cache_dir = self.config.cache_dir()?;
        let vault = match CredentialStore::vault_passphrase(self.config.tenant()) {
            Ok(passphrase) => Some(Vault::new(passphrase)),
            Err(e) => {
                warn!(error = %e, "Keychain unavailable, session will not be persisted");
                None
            }
        };
        let mut session = Session::new(cache_dir, vault);
        match session.load() {
            Ok(loaded) => debug!(loaded, "Session loaded"),
            Err(e) => warn!(error = %e, "Failed to load session"),
        }
        Ok(session)
    }

    fn token_provider(&self) -> Result<TokenProvider> {
        let client_id = self.config.client_id()?;
        let identity = IdentityClient::new(self.config.tenant(), client_id)?;
        let secret = CredentialStore::get_client_secret(client_id).ok();
        Ok(TokenProvider::new(
            identity,
            self.open_session()?,
            Section::all_scopes(),
            secret,
        ))
    }

    async fn graph(&self) -> Result<GraphClient> {
        let mut provider = self.token_provider()?;
        let token = provider.access_token().await?;
        Ok(GraphClient::new()?.with_token(token))
    }

    async fn login(&mut self, client_secret: Option<String>) -> Result<()> {
        self.cache.record_navigation("/login", "Sign in").await;
        let client_id = self.config.client_id()?.to_string();
        let identity = IdentityClient::new(self.config.tenant(), &client_id)?;
        let mut session = self.open_session()?;

        if let Some(secret) = client_secret {
            let data = identity
                .client_credentials(&secret)
                .await
                .context("Client secret was not accepted")?;
            CredentialStore::store_client_secret(&client_id, &secret)?;
            session.update(data);
            println!("Client secret stored in the keychain; app-only access verified.");
            return Ok(());
        }

        let scopes = Section::all_scopes();
        let code = identity.start_device_code(&scopes).await?;
        eprintln!(
            "{}",
            code.message.clone().unwrap_or_else(|| format!(
                "To sign in, open {} and enter the code {}",
                code.verification_uri, code.user_code
            ))
        );

        let mut data = identity.poll_device_code(&code, &scopes).await?;
        let graph = GraphClient::new()?.with_token(Arc::new(data.access_token.clone()));
        match graph.fetch_me().await {
            Ok(me) => data.account = Some(me.user_principal_name),
            Err(e) => warn!(error = %e, "Could not read signed-in account"),
        }

        if !session.is_persistent() {
            eprintln!("Warning: OS keychain unavailable; you will need to sign in again next time.");
        }
        session.update(data);

        let account = session.account().unwrap_or("unknown account").to_string();
        self.remember_account(&account);
        info!(account = %account, "Signed in");
        println!("Signed in as {}", account);
        Ok(())
    }

    /// Persist the last account without writing environment overrides to disk.
    fn remember_account(&mut self, account: &str) {
        self.config.last_account = Some(account.to_string());
        let saved = Config::config_path().and_then(|path| {
            let mut on_disk = Config::load_from(&path)?;
            on_disk.last_account = Some(account.to_string());
            on_disk.save_to(&path)
        });
        if let Err(e) = saved {
            warn!(error = %e, "Failed to save config");
        }
    }

    async fn logout(&self, forget_secret: bool) -> Result<()> {
        self.cache.record_navigation("/logout", "Sign out").await;
        let mut session = self.open_session()?;
        session.clear()?;
        if forget_secret {
            let client_id = self.config.client_id()?;
            if CredentialStore::has_client_secret(client_id) {
                CredentialStore::delete_client_secret(client_id)?;
            }
        }
        println!("Signed out.");
        Ok(())
    }

    // ===== Sections =====

    async fn status(&self) -> Result<()> {
        self.cache.record_navigation("/status", "Status").await;

        println!("Tenant:       {}", self.config.tenant());
        println!(
            "Client ID:    {}",
            self.config.client_id.as_deref().unwrap_or("(not configured)")
        );
        if let Ok(client_id) = self.config.client_id() {
            let session = self.open_session()?;
            match session.data {
                Some(ref data) if !data.is_expired() => println!(
                    "Session:      {} (token expires in {}m)",
                    data.account.as_deref().unwrap_or("app-only"),
                    data.minutes_until_expiry()
                ),
                Some(_) => println!("Session:      expired, will refresh on next use"),
                None => println!("Session:      not signed in"),
            }
            println!(
                "App secret:   {}",
                if CredentialStore::has_client_secret(client_id) { "stored" } else { "none" }
            );
        }
        if let Some(ref url) = self.config.sync_url {
            println!("Sync server:  {}", url);
        }
        if let Some(updated) = self.cache.last_updated().await {
            println!("Last updated: {}", format_epoch_ms(updated));
        }
        println!();

        let mut table = Table::new(&["Section", "Key", "Items", "Age", "Fresh"]);
        for section in Section::ALL {
            let key = section.key();
            let Some(age) = self.cache.age_display(key).await else {
                continue;
            };
            let count = self
                .cache
                .metadata(key)
                .await
                .and_then(|m| m.get("count").and_then(|c| c.as_u64()))
                .map(|c| c.to_string())
                .unwrap_or_default();
            let fresh = if self.cache.is_fresh_default(key).await { "yes" } else { "no" };
            table.push(vec![
                section.title().to_string(),
                key.to_string(),
                count,
                age,
                fresh.to_string(),
            ]);
        }
        if table.is_empty() {
            println!("No cached sections. Run `tenantscope refresh`.");
        } else {
            print!("{}", table.render());
        }
        Ok(())
    }

    async fn refresh(&self, names: &[String], force: bool) -> Result<()> {
        let sections = parse_sections(names)?;
        self.cache.record_navigation("/refresh", "Refresh").await;

        let graph = self.graph().await?;
        let report = Refresher::new(graph, Arc::clone(&self.cache))
            .refresh(&sections, force)
            .await;

        let mut table = Table::new(&["Section", "Result"]);
        for (section, outcome) in &report.outcomes {
            let result = match outcome {
                SectionOutcome::Loaded { count } => format!("loaded {} items", count),
                SectionOutcome::Skipped => "fresh, skipped".to_string(),
                SectionOutcome::InsufficientPermissions(_) => "insufficient permissions".to_string(),
                SectionOutcome::Failed(msg) => format!("failed: {}", msg),
            };
            table.push(vec![section.title().to_string(), result]);
        }
        print!("{}", table.render());
        println!(
            "\n{} loaded, {} with errors, {} total",
            report.loaded(),
            report.errors(),
            report.outcomes.len()
        );
        Ok(())
    }

    async fn show(
        &self,
        name: &str,
        filter: Option<&str>,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<()> {
        let section: Section = name.parse()?;
        let filter = parse_filter(filter)?;
        self.cache.record_navigation(section.path(), section.title()).await;

        let Some(data) = self.cache.get(section.key()).await else {
            bail!(
                "No cached data for {}. Run `tenantscope refresh --section {}` first.",
                section.title(),
                section.key()
            );
        };

        let mut table = section_table(section, &data, filter, Utc::now())?;
        if let Some(query) = search.filter(|q| !q.trim().is_empty()) {
            table.retain_matching(query.trim());
        }
        let total = table.len();
        if let Some(limit) = limit {
            table.truncate(limit);
        }

        print!("{}", table.render());
        let highlights = section_highlights(section, &data, Utc::now())?;
        if !highlights.is_empty() {
            println!();
            for line in highlights {
                println!("{}", line);
            }
        }
        let age = self.cache.age_display(section.key()).await.unwrap_or_default();
        if table.len() < total {
            println!("\n{} of {} rows, cached {}", table.len(), total, age);
        } else {
            println!("\n{} rows, cached {}", total, age);
        }
        Ok(())
    }

    async fn summary(&self) -> Result<()> {
        self.cache.record_navigation("/assistant", "AI Summary").await;
        print!("{}", self.cache.ai_summary().await);
        Ok(())
    }

    async fn export(&self, name: &str, output: &Path, filter: Option<&str>) -> Result<()> {
        let section: Section = name.parse()?;
        let filter = parse_filter(filter)?;
        self.cache
            .record_navigation(section.path(), &format!("{} export", section.title()))
            .await;

        let Some(data) = self.cache.get(section.key()).await else {
            bail!("No cached data for {} to export", section.title());
        };

        let csv = match section {
            Section::Users => {
                let users: Vec<User> = serde_json::from_value(data)?;
                let selected = insights::filter_users(
                    &users,
                    filter.unwrap_or(UserFilter::All),
                    None,
                    Utc::now(),
                );
                reports::users_csv(&selected)?
            }
            Section::Groups => reports::groups_csv(&serde_json::from_value::<Vec<Group>>(data)?)?,
            Section::Devices => reports::devices_csv(&serde_json::from_value::<Vec<Device>>(data)?)?,
            Section::Licenses => {
                let skus: Vec<SubscribedSku> = serde_json::from_value(data)?;
                reports::licenses_csv(&insights::license_usage(&skus))?
            }
            Section::Sites => reports::sites_csv(&serde_json::from_value::<Vec<Site>>(data)?)?,
            Section::SecureScoreControls => {
                let profiles: Vec<SecureScoreControlProfile> = serde_json::from_value(data)?;
                let scores: Vec<SecureScore> = cached(&self.cache, Section::SecureScore)
                    .await?
                    .unwrap_or_default();
                let latest = insights::latest_secure_score(&scores).cloned().unwrap_or_default();
                let actions = insights::improvement_actions(&latest, &profiles, usize::MAX);
                reports::secure_score_actions_csv(&actions)?
            }
            _ => reports::json_csv(&data)?,
        };

        reports::write_report(output, &csv)?;
        println!("Exported {} to {}", section.title(), output.display());
        Ok(())
    }

    async fn script(
        &self,
        action: &str,
        users: &[String],
        filter: Option<&str>,
        output: &Path,
    ) -> Result<()> {
        let action: RemediationAction = action.parse()?;
        let filter = parse_filter(filter)?;
        self.cache
            .record_navigation("/entra/users/remediation", action.description())
            .await;

        let upns: Vec<String> = match filter {
            Some(filter) => {
                let Some(cached_users) = cached::<Vec<User>>(&self.cache, Section::Users).await? else {
                    bail!("No cached users. Run `tenantscope refresh --section users` first.");
                };
                insights::filter_users(&cached_users, filter, None, Utc::now())
                    .into_iter()
                    .map(|u| u.user_principal_name.clone())
                    .collect()
            }
            None => users.to_vec(),
        };

        let script = reports::build_script(action, &upns[..], self.config.tenant_id.as_deref(), Utc::now())?;
        reports::write_report(output, &script)?;
        // build_script rejects blanks and duplicates, so this matches the header
        println!(
            "Wrote '{}' script for {} users to {}",
            action.description(),
            upns.len(),
            output.display()
        );
        Ok(())
    }

    async fn clear(&self, names: &[String]) -> Result<()> {
        self.cache.record_navigation("/settings/cache", "Clear cache").await;
        if names.is_empty() {
            self.cache.clear_all().await;
            println!("Cleared all cached sections.");
            return Ok(());
        }
        for section in parse_sections(names)? {
            if self.cache.clear(section.key()).await {
                println!("Cleared {}", section.title());
            } else {
                println!("{} was not cached", section.title());
            }
        }
        Ok(())
    }

    async fn history(&self) -> Result<()> {
        let entries = self.cache.navigation_history().await;
        if entries.is_empty() {
            println!("No navigation history.");
        } else {
            let mut table = Table::new(&["When", "Title", "Path"]);
            for entry in &entries {
                table.push(vec![
                    format_epoch_ms(entry.timestamp),
                    entry.title.clone(),
                    entry.path.clone(),
                ]);
            }
            print!("{}", table.render());
        }
        self.cache.record_navigation("/history", "History").await;
        Ok(())
    }

    async fn contact(&self, request: SupportRequest) -> Result<()> {
        self.cache.record_navigation("/contact", "Contact").await;
        let Some(ref key) = self.config.web3forms_access_key else {
            bail!("No contact form access key configured (set TENANTSCOPE_WEB3FORMS_KEY)");
        };
        let reply = ContactClient::new(key.as_str())?.submit(&request).await?;
        if !reply.success {
            bail!("Message was not sent: {}", reply.message);
        }
        println!("Message sent. {}", reply.message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_defaults_to_all() {
        assert_eq!(parse_sections(&[]).unwrap().len(), Section::ALL.len());
        let picked = parse_sections(&["users".to_string(), "exchange".to_string()]).unwrap();
        assert_eq!(picked, vec![Section::Users, Section::Mailboxes]);
        assert!(parse_sections(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter(None).unwrap(), None);
        assert_eq!(parse_filter(Some("guests")).unwrap(), Some(UserFilter::Guests));
        assert!(parse_filter(Some("bogus")).is_err());
    }
}
