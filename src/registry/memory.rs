//! In-memory registry for engine tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::RegistryStore;
use crate::error::{Error, Result};

/// Thread-safe in-memory store with failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: BTreeMap<String, String>,
    /// Successful writes still allowed before every call fails.
    writes_left: Option<usize>,
    /// Recorded mutations, in order: `put <key>` / `delete <prefix>`.
    log: Vec<String>,
}

fn under(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    key == prefix || key.starts_with(&format!("{}/", prefix))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap();
            for (k, v) in entries {
                state.keys.insert(k.to_string(), v.to_string());
            }
        }
        store
    }

    /// Seed a key without recording a mutation.
    pub fn insert(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .keys
            .insert(key.to_string(), value.to_string());
    }

    /// Let `n` more writes succeed, then fail every call.
    pub fn fail_after_writes(&self, n: usize) {
        self.state.lock().unwrap().writes_left = Some(n);
    }

    /// Bring the store back after [`fail_after_writes`](Self::fail_after_writes).
    pub fn recover(&self) {
        self.state.lock().unwrap().writes_left = None;
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().keys.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.keys().cloned().collect()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    fn check(state: &MemoryState, operation: String) -> Result<()> {
        match state.writes_left {
            Some(0) => Err(Error::registry(operation, "connection refused")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn read(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let state = self.state.lock().unwrap();
        Self::check(&state, format!("read {}", prefix))?;
        Ok(state
            .keys
            .iter()
            .filter(|(k, _)| under(k, prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, format!("write {}", key))?;
        if let Some(left) = state.writes_left.as_mut() {
            *left -= 1;
        }
        state.keys.insert(key.to_string(), value.to_string());
        state.log.push(format!("put {}", key));
        Ok(())
    }

    async fn delete(&self, prefix: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, format!("delete {}", prefix))?;
        state.keys.retain(|k, _| !under(k, prefix));
        state.log.push(format!("delete {}", prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_is_recursive_and_scoped() {
        let store = MemoryStore::with_entries([
            ("backends/api/2.0/abc/ip", "10.0.0.1"),
            ("backends/api/2.0/abc/port/8080", "33000"),
            ("backends/api/2.0/abcd/ip", "10.0.0.1"),
        ]);

        store.delete("backends/api/2.0/abc").await.unwrap();
        assert_eq!(store.keys(), vec!["backends/api/2.0/abcd/ip".to_string()]);

        // Deleting again is a no-op.
        store.delete("backends/api/2.0/abc").await.unwrap();
        assert_eq!(store.keys().len(), 1);
    }

    #[tokio::test]
    async fn list_children_returns_direct_segments() {
        let store = MemoryStore::with_entries([
            ("backends/api/2.0/abc/ip", "10.0.0.1"),
            ("backends/api/2.0/abc/port/8080", "33000"),
            ("backends/api/2.0/abc/env", "default"),
        ]);

        let children = store.list_children("backends/api/2.0/abc").await.unwrap();
        assert_eq!(children, vec!["env", "ip", "port"]);
        assert!(store.list_children("backends/web").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failure_blocks_everything() {
        let store = MemoryStore::new();
        store.fail_after_writes(1);
        store.write("a/b", "1").await.unwrap();
        assert!(store.write("a/c", "2").await.is_err());
        assert!(store.read("a").await.is_err());
        assert!(store.delete("a").await.is_err());
    }
}
