//! In-memory cache backend.
//!
//! A first-class backend for tests and contexts without a workspace, with
//! semantics identical to the file store.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::{CacheError, ModuleCache};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    fingerprint: String,
    written: SystemTime,
}

/// HashMap-backed cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryModuleCache {
    entries: HashMap<String, Entry>,
}

impl MemoryModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ModuleCache for MemoryModuleCache {
    fn cache_module(
        &mut self,
        name: &str,
        bytes: &[u8],
        fingerprint: &str,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            name.to_string(),
            Entry {
                bytes: bytes.to_vec(),
                fingerprint: fingerprint.to_string(),
                written: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn retrieve_from_cache(&self, name: &str, fingerprint: &str) -> Option<Vec<u8>> {
        self.entries
            .get(name)
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| e.bytes.clone())
    }

    fn cache_update_time(&self, name: &str) -> Option<SystemTime> {
        self.entries.get(name).map(|e| e.written)
    }

    fn erase_from_cache(&mut self, name: &str) -> Result<(), CacheError> {
        self.entries.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_overwrite() {
        let mut cache = MemoryModuleCache::new();
        cache.cache_module("m", b"one", "fp1").unwrap();
        cache.cache_module("m", b"two", "fp2").unwrap();

        assert_eq!(cache.retrieve_from_cache("m", "fp1"), None);
        assert_eq!(cache.retrieve_from_cache("m", "fp2"), Some(b"two".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn erase_removes_entry() {
        let mut cache = MemoryModuleCache::new();
        cache.cache_module("m", b"one", "fp").unwrap();
        cache.erase_from_cache("m").unwrap();
        assert!(cache.is_empty());
        assert!(cache.cache_update_time("m").is_none());
    }
}
