use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default freshness window: one hour.
pub const DEFAULT_MAX_AGE_MS: i64 = 3_600_000;

/// Navigation history keeps this many entries, most recent first.
pub const MAX_NAVIGATION_HISTORY: usize = 10;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Last-known-good result for one section, e.g. "users" or "mailboxes".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSection {
    pub data: Value,
    /// Epoch milliseconds when the section was stored.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub path: String,
    pub title: String,
    pub timestamp: i64,
}

/// Everything the section cache holds. The JSON shape is shared with the
/// development sync server, hence the camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionStore {
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub sections: BTreeMap<String, CachedSection>,
    #[serde(rename = "navigationHistory", default)]
    pub navigation_history: Vec<NavigationEntry>,
}

impl SectionStore {
    /// Insert or overwrite a section. Last write wins.
    pub fn put(&mut self, key: &str, data: Value, metadata: Option<Map<String, Value>>, now: i64) {
        self.sections.insert(
            key.to_string(),
            CachedSection {
                data,
                timestamp: now,
                metadata,
            },
        );
        self.last_updated = Some(now);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sections.get(key).map(|s| &s.data)
    }

    pub fn section(&self, key: &str) -> Option<&CachedSection> {
        self.sections.get(key)
    }

    pub fn is_fresh_at(&self, key: &str, max_age_ms: i64, now: i64) -> bool {
        match self.sections.get(key) {
            Some(section) => now - section.timestamp <= max_age_ms,
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<CachedSection> {
        self.sections.remove(key)
    }

    /// Drop every section and forget when the store was last updated.
    /// Navigation history is not section data and is kept.
    pub fn clear_sections(&mut self) {
        self.sections.clear();
        self.last_updated = None;
    }

    pub fn push_navigation(&mut self, path: &str, title: &str, now: i64) {
        self.navigation_history.insert(
            0,
            NavigationEntry {
                path: path.to_string(),
                title: title.to_string(),
                timestamp: now,
            },
        );
        self.navigation_history.truncate(MAX_NAVIGATION_HISTORY);
    }

    /// Merge a remote copy into this one. A remote section replaces the local
    /// one only when its timestamp is strictly newer. Returns how many
    /// sections were taken from the remote.
    pub fn merge_remote(&mut self, remote: SectionStore) -> usize {
        let mut taken = 0;
        for (key, remote_section) in remote.sections {
            let newer = match self.sections.get(&key) {
                Some(local) => remote_section.timestamp > local.timestamp,
                None => true,
            };
            if newer {
                self.sections.insert(key, remote_section);
                taken += 1;
            }
        }

        self.last_updated = match (self.last_updated, remote.last_updated) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        if self.navigation_history.is_empty() {
            self.navigation_history = remote.navigation_history;
            self.navigation_history.truncate(MAX_NAVIGATION_HISTORY);
        }

        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_then_get_returns_same_data() {
        let mut store = SectionStore::default();
        let data = json!([{"id": "1", "displayName": "Adele, \"AV\" Vance"}]);
        store.put("users", data.clone(), None, 1_000);
        assert_eq!(store.get("users"), Some(&data));
        assert_eq!(store.last_updated, Some(1_000));
        assert!(store.get("groups").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = SectionStore::default();
        store.put("users", json!([1]), None, 1_000);
        store.put("users", json!([2]), None, 2_000);
        assert_eq!(store.get("users"), Some(&json!([2])));
        assert_eq!(store.sections.len(), 1);
        assert_eq!(store.section("users").unwrap().timestamp, 2_000);
    }

    #[test]
    fn test_freshness_window() {
        let mut store = SectionStore::default();
        store.put("users", json!([]), None, 10_000);
        assert!(store.is_fresh_at("users", DEFAULT_MAX_AGE_MS, 10_000));
        assert!(store.is_fresh_at("users", DEFAULT_MAX_AGE_MS, 10_000 + DEFAULT_MAX_AGE_MS));
        assert!(!store.is_fresh_at("users", DEFAULT_MAX_AGE_MS, 10_001 + DEFAULT_MAX_AGE_MS));
        assert!(!store.is_fresh_at("groups", DEFAULT_MAX_AGE_MS, 10_000));
    }

    #[test]
    fn test_clear_sections_resets_last_updated() {
        let mut store = SectionStore::default();
        store.put("users", json!([]), None, 1);
        store.put("groups", json!([]), None, 2);
        store.push_navigation("/users", "Users", 3);
        store.clear_sections();
        assert!(store.sections.is_empty());
        assert_eq!(store.last_updated, None);
        assert_eq!(store.navigation_history.len(), 1);
    }

    #[test]
    fn test_navigation_history_is_bounded_most_recent_first() {
        let mut store = SectionStore::default();
        for i in 0..15 {
            store.push_navigation(&format!("/page/{}", i), "Page", i);
        }
        assert_eq!(store.navigation_history.len(), MAX_NAVIGATION_HISTORY);
        assert_eq!(store.navigation_history[0].path, "/page/14");
        assert_eq!(store.navigation_history[9].path, "/page/5");
    }

    #[test]
    fn test_merge_remote_prefers_newer_sections() {
        let mut local = SectionStore::default();
        local.put("users", json!(["local-users"]), None, 2_000);
        local.put("groups", json!(["local-groups"]), None, 5_000);

        let mut remote = SectionStore::default();
        remote.put("users", json!(["remote-users"]), None, 3_000);
        remote.put("groups", json!(["remote-groups"]), None, 5_000);
        remote.put("sites", json!(["remote-sites"]), None, 1_000);
        remote.push_navigation("/sites", "Sites", 1_000);

        let taken = local.merge_remote(remote);

        assert_eq!(taken, 2);
        assert_eq!(local.get("users"), Some(&json!(["remote-users"])));
        // Equal timestamps keep the local copy
        assert_eq!(local.get("groups"), Some(&json!(["local-groups"])));
        assert_eq!(local.get("sites"), Some(&json!(["remote-sites"])));
        assert_eq!(local.last_updated, Some(5_000));
        assert_eq!(local.navigation_history.len(), 1);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut store = SectionStore::default();
        let mut meta = Map::new();
        meta.insert("source".to_string(), json!("graph"));
        store.put("users", json!([]), Some(meta), 42);
        store.push_navigation("/", "Home", 43);

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["lastUpdated"], json!(42));
        assert_eq!(value["sections"]["users"]["metadata"]["source"], json!("graph"));
        assert_eq!(value["navigationHistory"][0]["title"], json!("Home"));

        let parsed: SectionStore = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_parse_partial_document() {
        let parsed: SectionStore = serde_json::from_str(r#"{"sections": {}}"#).unwrap();
        assert_eq!(parsed, SectionStore::default());
    }
}
