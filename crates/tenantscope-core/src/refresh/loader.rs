//! Concurrent section loading.
//!
//! Each stale section is fetched in its own task; results come back over an
//! mpsc channel and are written to the section cache as they arrive. One
//! section failing never stops the others.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::graph::{is_permission_denied, GraphClient};
use crate::store::SectionCache;

use super::Section;

/// Buffer size for the result channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Secure Score snapshots kept for the trend (one per day).
const SECURE_SCORE_HISTORY: u32 = 30;

const MESSAGE_CENTER_TOP: u32 = 100;

/// Log sections only keep the most recent entries.
const LOG_TOP: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Loaded { count: usize },
    /// Cached copy still fresh.
    Skipped,
    InsufficientPermissions(String),
    Failed(String),
}

impl SectionOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SectionOutcome::InsufficientPermissions(_) | SectionOutcome::Failed(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub outcomes: Vec<(Section, SectionOutcome)>,
}

impl RefreshReport {
    pub fn outcome(&self, section: Section) -> Option<&SectionOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, outcome)| outcome)
    }

    pub fn loaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SectionOutcome::Loaded { .. }))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_error()).count()
    }
}

pub struct Refresher {
    graph: GraphClient,
    cache: Arc<SectionCache>,
}

impl Refresher {
    pub fn new(graph: GraphClient, cache: Arc<SectionCache>) -> Self {
        Self { graph, cache }
    }

    /// Refresh the given sections. Fresh sections are skipped unless `force`.
    /// Outcomes are returned in section order.
    pub async fn refresh(&self, sections: &[Section], force: bool) -> RefreshReport {
        let mut wanted: Vec<Section> = sections.to_vec();
        wanted.sort();
        wanted.dedup();

        let (tx, mut rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut report = RefreshReport::default();

        for section in wanted {
            if !force && self.cache.is_fresh_default(section.key()).await {
                debug!(section = section.key(), "Cached section still fresh");
                report.outcomes.push((section, SectionOutcome::Skipped));
                continue;
            }

            let graph = self.graph.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = fetch_section(&graph, section).await;
                if let Err(e) = tx.send((section, result)).await {
                    error!(error = %e, "Failed to send refresh result - channel closed");
                }
            });
        }
        drop(tx);

        while let Some((section, result)) = rx.recv().await {
            let outcome = match result {
                Ok(data) => {
                    let count = item_count(&data);
                    self.cache
                        .store(section.key(), data, Some(section_metadata(section, count)))
                        .await;
                    info!(section = section.key(), count, "Section refreshed");
                    SectionOutcome::Loaded { count }
                }
                Err(e) if is_permission_denied(&e) => {
                    warn!(section = section.key(), error = %e, "Insufficient permissions");
                    SectionOutcome::InsufficientPermissions(format!("{:#}", e))
                }
                Err(e) => {
                    warn!(section = section.key(), error = %e, "Section refresh failed");
                    SectionOutcome::Failed(format!("{:#}", e))
                }
            };
            report.outcomes.push((section, outcome));
        }

        report.outcomes.sort_by_key(|(section, _)| *section);
        report
    }
}

/// Metadata stored next to a section's data.
pub fn section_metadata(section: Section, count: usize) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!("graph"));
    metadata.insert("endpoint".to_string(), json!(section.endpoint()));
    metadata.insert("count".to_string(), json!(count));
    metadata
}

fn item_count(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

fn to_value<T: Serialize>(items: T) -> Result<Value> {
    serde_json::to_value(items).context("Failed to serialize section data")
}

async fn fetch_section(graph: &GraphClient, section: Section) -> Result<Value> {
    match section {
        Section::Organization => to_value(graph.fetch_organization().await?),
        Section::Users => to_value(graph.fetch_users().await?),
        Section::Groups => to_value(graph.fetch_groups().await?),
        Section::Devices => to_value(graph.fetch_devices().await?),
        Section::Applications => to_value(graph.fetch_applications().await?),
        Section::ServicePrincipals => to_value(graph.fetch_service_principals().await?),
        Section::Domains => to_value(graph.fetch_domains().await?),
        Section::Licenses => to_value(graph.fetch_subscribed_skus().await?),
        Section::SecureScore => to_value(graph.fetch_secure_scores(SECURE_SCORE_HISTORY).await?),
        Section::SecureScoreControls => to_value(graph.fetch_secure_score_profiles().await?),
        Section::ServiceHealth => to_value(graph.fetch_service_health().await?),
        Section::ServiceIssues => to_value(graph.fetch_service_issues().await?),
        Section::MessageCenter => to_value(graph.fetch_message_center(MESSAGE_CENTER_TOP).await?),
        Section::SignIns => to_value(graph.fetch_sign_ins(LOG_TOP).await?),
        Section::AuditLogs => to_value(graph.fetch_directory_audits(LOG_TOP).await?),
        Section::Sites => to_value(graph.fetch_sites().await?),
        Section::Teams => to_value(graph.fetch_teams().await?),
        Section::Mailboxes => to_value(graph.fetch_mailbox_usage().await?),
        Section::SensitivityLabels => to_value(graph.fetch_sensitivity_labels().await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offline_graph() -> GraphClient {
        GraphClient::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .with_token(Arc::new("token".to_string()))
    }

    #[test]
    fn test_item_count() {
        assert_eq!(item_count(&json!([1, 2, 3])), 3);
        assert_eq!(item_count(&json!({"id": "org"})), 1);
        assert_eq!(item_count(&Value::Null), 0);
    }

    #[test]
    fn test_section_metadata() {
        let metadata = section_metadata(Section::Licenses, 4);
        assert_eq!(metadata["source"], "graph");
        assert_eq!(metadata["endpoint"], "/v1.0/subscribedSkus");
        assert_eq!(metadata["count"], 4);
    }

    #[tokio::test]
    async fn test_fresh_sections_skipped() {
        let cache = Arc::new(SectionCache::in_memory());
        cache.store(Section::Users.key(), json!([]), None).await;
        cache.store(Section::Groups.key(), json!([]), None).await;

        let refresher = Refresher::new(offline_graph(), Arc::clone(&cache));
        let report = refresher
            .refresh(&[Section::Groups, Section::Users, Section::Users], false)
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0], (Section::Users, SectionOutcome::Skipped));
        assert_eq!(report.outcomes[1], (Section::Groups, SectionOutcome::Skipped));
        assert_eq!(report.errors(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_reported_per_section() {
        let cache = Arc::new(SectionCache::in_memory());
        cache.store(Section::Users.key(), json!([{"id": "u1"}]), None).await;

        let refresher = Refresher::new(offline_graph(), Arc::clone(&cache));
        let report = refresher.refresh(&[Section::Users, Section::Domains], true).await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcome(Section::Users), Some(SectionOutcome::Failed(_))));
        assert!(matches!(report.outcome(Section::Domains), Some(SectionOutcome::Failed(_))));
        assert_eq!(report.loaded(), 0);
        // The previous copy survives a failed refresh
        assert_eq!(cache.get(Section::Users.key()).await, Some(json!([{"id": "u1"}])));
        assert!(cache.get(Section::Domains.key()).await.is_none());
    }
}
