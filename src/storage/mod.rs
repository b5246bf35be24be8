//! Persistent storage lifecycle for a graph storage root.
//!
//! A storage root is a directory holding one metadata file (a durable map of
//! named string sets) and any number of named object stores, each wrapped in
//! a bounded read cache.

/// Read cache wrapped around storage managers.
pub mod cache;

/// Durable map of named string sets.
pub mod metadata;

/// Raw persistent object stores and their factories.
pub mod object;

mod disk;
mod options;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Storage root with open/flush/rollback/close semantics.
pub use disk::PersistentGraphStore;

/// Storage configuration.
pub use options::{StorageOptions, DEFAULT_READ_CACHE_CAPACITY, METADATA_FILE_NAME};

pub use cache::CachedStorageManager;
pub use metadata::MetadataStore;
pub use object::{FileStorageManager, FileStoreFactory, StorageManager, StoreFactory};

/// Appends `.ext` to the file name of `path`, keeping any existing extension.
pub(crate) fn with_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}
