//! Default file-backed cache under the workspace.
//!
//! Entry layout: `<root>/lib/<full/module/name>.ir` holds the serialized
//! bytes, with a `.ir.fp` sidecar holding the fingerprint. Writes go through
//! a temporary file in the same directory and a rename, which is atomic on
//! the filesystems we care about.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{CacheError, ModuleCache};

/// File store rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct FileModuleCache {
    root: PathBuf,
}

impl FileModuleCache {
    /// Creates a cache rooted at `workspace` (entries live in
    /// `<workspace>/lib/`).
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        FileModuleCache {
            root: workspace.into(),
        }
    }

    /// Path of the bytes file for a module.
    pub fn cache_path_for_module(&self, name: &str) -> PathBuf {
        self.root.join("lib").join(format!("{}.ir", name))
    }

    fn fingerprint_path(&self, name: &str) -> PathBuf {
        self.root.join("lib").join(format!("{}.ir.fp", name))
    }

    fn write_atomic(path: &Path, bytes: &[u8], name: &str) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            name: name.to_string(),
            source,
        };

        let parent = path.parent().ok_or(CacheError::NoStorageRoot)?;
        fs::create_dir_all(parent).map_err(io_err)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|source| CacheError::Io {
            name: name.to_string(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| CacheError::Io {
            name: name.to_string(),
            source,
        })
    }
}

impl ModuleCache for FileModuleCache {
    fn cache_module(
        &mut self,
        name: &str,
        bytes: &[u8],
        fingerprint: &str,
    ) -> Result<(), CacheError> {
        Self::write_atomic(&self.cache_path_for_module(name), bytes, name)?;
        Self::write_atomic(&self.fingerprint_path(name), fingerprint.as_bytes(), name)
    }

    fn retrieve_from_cache(&self, name: &str, fingerprint: &str) -> Option<Vec<u8>> {
        let stored = fs::read_to_string(self.fingerprint_path(name)).ok()?;
        if stored != fingerprint {
            return None;
        }
        fs::read(self.cache_path_for_module(name)).ok()
    }

    fn cache_update_time(&self, name: &str) -> Option<SystemTime> {
        fs::metadata(self.cache_path_for_module(name))
            .and_then(|m| m.modified())
            .ok()
    }

    fn erase_from_cache(&mut self, name: &str) -> Result<(), CacheError> {
        for path in [
            self.cache_path_for_module(name),
            self.fingerprint_path(name),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CacheError::Io {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_retrieve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileModuleCache::new(dir.path());

        cache.cache_module("test/main", b"bytes", "fp1").unwrap();
        assert_eq!(
            cache.retrieve_from_cache("test/main", "fp1"),
            Some(b"bytes".to_vec())
        );
        assert!(cache.cache_update_time("test/main").is_some());
    }

    #[test]
    fn mismatched_fingerprint_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileModuleCache::new(dir.path());

        cache.cache_module("test/main", b"bytes", "fp1").unwrap();
        assert_eq!(cache.retrieve_from_cache("test/main", "fp2"), None);
    }

    #[test]
    fn nested_module_names_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileModuleCache::new(dir.path());

        cache
            .cache_module("github.com/user/mod", b"x", "fp")
            .unwrap();
        assert!(dir.path().join("lib/github.com/user/mod.ir").is_file());
    }

    #[test]
    fn erase_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileModuleCache::new(dir.path());

        cache.cache_module("m", b"x", "fp").unwrap();
        cache.erase_from_cache("m").unwrap();
        assert_eq!(cache.retrieve_from_cache("m", "fp"), None);
        cache.erase_from_cache("m").unwrap();
    }
}
