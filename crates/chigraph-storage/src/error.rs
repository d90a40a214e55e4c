//! Cache error types.

use thiserror::Error;

/// Errors produced by module cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure while reading or writing an entry.
    #[error("cache I/O error for '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend has no storage location (e.g. a file cache with no
    /// workspace directory).
    #[error("cache has no storage root")]
    NoStorageRoot,
}
