use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Flat string-keyed store backing every collection.
///
/// Writes overwrite unconditionally; there is no versioning and the last
/// writer wins.
pub trait KvStore {
    fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    fn contains(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get_raw(key)?.is_some())
    }

    /// Human-readable backing description for `health`.
    fn describe(&self) -> String;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Deserialized value under `key`, or `None` when absent or corrupt.
///
/// Corruption is logged and otherwise swallowed: callers fall back to their
/// empty default.
pub fn read<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> anyhow::Result<Option<T>> {
    let Some(raw) = store.get_raw(key)? else {
        return Ok(None);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored value is not valid json; treating as empty");
            Ok(None)
        }
    }
}

pub fn write<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    tracing::debug!(key, bytes = raw.len(), "store write");
    store.set_raw(key, &raw)
}
