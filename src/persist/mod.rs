//! Best-effort persistence mirror
//!
//! The registry mirrors a summary of its open tabs (and a handful of user
//! preference keys) into an external key-value store. Persistence is
//! advisory: a missing or corrupt slot restores to an empty registry, and a
//! failed write is logged and dropped, never surfaced to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::errors::PersistError;

/// Current key namespace
pub const STORE_PREFIX: &str = "tabs:";

/// Key namespace used by older releases, migrated once at startup
const LEGACY_PREFIX: &str = "chatui:";

/// Slot holding the ordered open-tab summary
pub const OPEN_TABS_KEY: &str = "tabs:open-tabs";

/// Preference keys copied from the legacy namespace on first startup
const MIGRATED_KEYS: [&str; 4] = [
    "last-selected-model",
    "open-tabs",
    "active-presets",
    "disabled-skills",
];

/// External key-value store port
///
/// Implementations are infallible from the caller's perspective; failures
/// are handled (and logged) inside the implementation.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// File-backed store: one JSON object per store file
///
/// Loaded once on open; every write flushes the whole map. A corrupt file is
/// discarded with a warning rather than failing startup.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read store file {}", path.display()))?;
            match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "discarding corrupt store file");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        match serde_json::to_string_pretty(entries) {
            Ok(content) => {
                if let Err(err) = std::fs::write(&self.path, content) {
                    tracing::warn!(path = %self.path.display(), %err, "failed to write store file");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize store contents"),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        self.flush(&entries);
    }
}

/// Persisted summary of one open, non-draft tab
///
/// The legacy record shape lacked `conversationId`; the stored `id` then
/// doubled as both session id and conversation id, which restore detects
/// and migrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTab {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Serialize the open-tab summary into its slot (best-effort)
pub fn save_open_tabs(store: &dyn KeyValueStore, tabs: &[PersistedTab]) {
    match serde_json::to_string(tabs) {
        Ok(json) => store.set(OPEN_TABS_KEY, &json),
        Err(err) => tracing::warn!(%err, "failed to serialize open tabs"),
    }
}

/// Read the open-tab summary; absent or malformed content restores nothing
pub fn load_open_tabs(store: &dyn KeyValueStore) -> Vec<PersistedTab> {
    let Some(raw) = store.get(OPEN_TABS_KEY) else {
        return Vec::new();
    };
    match decode_tabs(&raw) {
        Ok(tabs) => tabs,
        Err(err) => {
            tracing::warn!(%err, "discarding malformed open-tab record");
            Vec::new()
        }
    }
}

fn decode_tabs(raw: &str) -> std::result::Result<Vec<PersistedTab>, PersistError> {
    Ok(serde_json::from_str(raw)?)
}

/// One-time migration of legacy-prefixed preference keys
///
/// Each key is copied to the new namespace only when the destination is
/// absent; the legacy key is removed unconditionally.
pub fn migrate_legacy_keys(store: &dyn KeyValueStore) {
    for key in MIGRATED_KEYS {
        let legacy = format!("{LEGACY_PREFIX}{key}");
        let Some(value) = store.get(&legacy) else {
            continue;
        };
        let current = format!("{STORE_PREFIX}{key}");
        if store.get(&current).is_none() {
            store.set(&current, &value);
            tracing::debug!(key, "migrated legacy preference key");
        }
        store.remove(&legacy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_json_file_store_persists_across_opens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("tabs:open-tabs", "[]");
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("tabs:open-tabs").as_deref(), Some("[]"));
    }

    #[test]
    fn test_json_file_store_tolerates_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_open_tabs_roundtrip() {
        let store = MemoryStore::new();
        let tabs = vec![PersistedTab {
            id: "s1".to_string(),
            title: "First".to_string(),
            conversation_id: Some("conv-1".to_string()),
        }];

        save_open_tabs(&store, &tabs);
        assert_eq!(load_open_tabs(&store), tabs);
    }

    #[test]
    fn test_load_open_tabs_malformed_is_empty() {
        let store = MemoryStore::new();
        store.set(OPEN_TABS_KEY, "not an array");
        assert!(load_open_tabs(&store).is_empty());
    }

    #[test]
    fn test_load_open_tabs_absent_is_empty() {
        let store = MemoryStore::new();
        assert!(load_open_tabs(&store).is_empty());
    }

    #[test]
    fn test_legacy_record_shape_deserializes() {
        let tabs: Vec<PersistedTab> =
            serde_json::from_str(r#"[{"id": "conv-1", "title": "Old"}]"#).unwrap();
        assert_eq!(tabs[0].conversation_id, None);
    }

    #[test]
    fn test_migrate_legacy_keys_copies_when_absent() {
        let store = MemoryStore::new();
        store.set("chatui:last-selected-model", "gpt-4o");

        migrate_legacy_keys(&store);

        assert_eq!(
            store.get("tabs:last-selected-model").as_deref(),
            Some("gpt-4o")
        );
        assert!(store.get("chatui:last-selected-model").is_none());
    }

    #[test]
    fn test_migrate_legacy_keys_keeps_existing_destination() {
        let store = MemoryStore::new();
        store.set("chatui:disabled-skills", "old-value");
        store.set("tabs:disabled-skills", "new-value");

        migrate_legacy_keys(&store);

        assert_eq!(store.get("tabs:disabled-skills").as_deref(), Some("new-value"));
        // Legacy key removed regardless
        assert!(store.get("chatui:disabled-skills").is_none());
    }

    #[test]
    fn test_migrate_legacy_keys_ignores_unlisted_keys() {
        let store = MemoryStore::new();
        store.set("chatui:unrelated", "keep");
        migrate_legacy_keys(&store);
        assert_eq!(store.get("chatui:unrelated").as_deref(), Some("keep"));
    }
}
