//! Section cache for offline reuse of Graph results.
//!
//! This module provides the `SectionCache`, a process-wide key/value cache
//! of the last successful result per dashboard section. It is shared across
//! commands and flattened into a text summary for the assistant prompt.
//!
//! - `section`: the stored document (`SectionStore`) and its pure operations
//! - `local`: synchronous persistence (JSON file or memory)
//! - `remote`: best-effort mirror on the development sync server
//! - `summary`: deterministic text rendering
//! - `cache`: the lazily-initialized handle tying them together

pub mod cache;
pub mod local;
pub mod remote;
pub mod section;
pub mod summary;

pub use cache::SectionCache;
pub use local::{FileStorage, LocalStorage, MemoryStorage};
pub use remote::RemoteSync;
pub use section::{
    now_ms, CachedSection, NavigationEntry, SectionStore, DEFAULT_MAX_AGE_MS,
    MAX_NAVIGATION_HISTORY,
};
pub use summary::render_summary;
