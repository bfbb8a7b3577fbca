//! Loading dashboard sections from Graph into the section cache.

pub mod loader;
pub mod section;

pub use loader::{section_metadata, RefreshReport, Refresher, SectionOutcome};
pub use section::Section;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::store::SectionCache;

/// Typed view of a cached section, `None` when never loaded.
pub async fn cached<T: DeserializeOwned>(cache: &SectionCache, section: Section) -> Result<Option<T>> {
    match cache.get(section.key()).await {
        Some(data) => serde_json::from_value(data)
            .map(Some)
            .with_context(|| format!("Cached {} data is not readable", section.title())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use serde_json::json;

    #[tokio::test]
    async fn test_cached_typed_view() {
        let cache = SectionCache::in_memory();
        assert!(cached::<Vec<User>>(&cache, Section::Users).await.unwrap().is_none());

        cache
            .store(
                Section::Users.key(),
                json!([{"id": "1", "userPrincipalName": "a@contoso.com", "accountEnabled": false}]),
                None,
            )
            .await;
        let users: Vec<User> = cached(&cache, Section::Users).await.unwrap().unwrap();
        assert_eq!(users[0].user_principal_name, "a@contoso.com");
        assert!(!users[0].is_enabled());

        cache.store(Section::Users.key(), json!("garbage"), None).await;
        assert!(cached::<Vec<User>>(&cache, Section::Users).await.is_err());
    }
}
