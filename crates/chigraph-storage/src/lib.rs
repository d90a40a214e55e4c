//! The module cache.
//!
//! Compiled modules are stored as opaque serialized bytes keyed by the
//! module's full name. A cache entry is valid only for a matching
//! *fingerprint* -- the caller's digest over the module content, its
//! dependency fingerprints, and the compile settings -- so a stale entry is
//! simply a miss.
//!
//! Two backends implement the [`ModuleCache`] trait and are fully swappable:
//! the default file store under the workspace and an in-memory store for
//! tests and ephemeral contexts.

pub mod error;
pub mod file;
pub mod memory;

pub use error::CacheError;
pub use file::FileModuleCache;
pub use memory::MemoryModuleCache;

use std::time::SystemTime;

/// Storage contract for compiled module bytes.
///
/// Implementations must make [`cache_module`](Self::cache_module) atomic:
/// a concurrent reader sees either the previous entry or the new one, never
/// a torn write.
pub trait ModuleCache {
    /// Stores `bytes` for `name` under `fingerprint`, replacing any previous
    /// entry.
    fn cache_module(&mut self, name: &str, bytes: &[u8], fingerprint: &str)
        -> Result<(), CacheError>;

    /// Retrieves the cached bytes for `name` if an entry exists and its
    /// fingerprint matches. A missing or mismatched entry is `None`.
    fn retrieve_from_cache(&self, name: &str, fingerprint: &str) -> Option<Vec<u8>>;

    /// The time the cache entry for `name` was last written, if any.
    fn cache_update_time(&self, name: &str) -> Option<SystemTime>;

    /// Removes the entry for `name`. Removing a missing entry is not an
    /// error.
    fn erase_from_cache(&mut self, name: &str) -> Result<(), CacheError>;
}
