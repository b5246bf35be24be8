use std::fmt;
use std::sync::Arc;

use super::object::{FileStoreFactory, StoreFactory};

/// Default number of objects held by each storage manager's read cache.
pub const DEFAULT_READ_CACHE_CAPACITY: usize = 100_000;

/// File name of the metadata store inside a storage root.
pub const METADATA_FILE_NAME: &str = "names.pm";

/// Configuration options supplied when opening a [`super::PersistentGraphStore`].
#[derive(Clone)]
pub struct StorageOptions {
    /// Capacity of the read cache wrapped around every storage manager
    pub read_cache_capacity: usize,
    /// Whether metadata and object store flushes call `fsync`
    pub sync_on_flush: bool,
    /// Creates the raw object stores behind each storage manager. `None`
    /// selects file-backed stores that follow `sync_on_flush`.
    pub factory: Option<Arc<dyn StoreFactory>>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            read_cache_capacity: DEFAULT_READ_CACHE_CAPACITY,
            sync_on_flush: true,
            factory: None,
        }
    }
}

impl StorageOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-store read cache capacity.
    pub fn read_cache_capacity(mut self, capacity: usize) -> Self {
        self.read_cache_capacity = capacity;
        self
    }

    /// Enables or disables `fsync` on flush.
    pub fn sync_on_flush(mut self, enabled: bool) -> Self {
        self.sync_on_flush = enabled;
        self
    }

    /// Replaces the factory used to create raw object stores.
    pub fn factory(mut self, factory: Arc<dyn StoreFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Factory to open object stores with: the configured one, or file-backed
    /// stores using the current sync setting.
    pub fn store_factory(&self) -> Arc<dyn StoreFactory> {
        match &self.factory {
            Some(factory) => Arc::clone(factory),
            None => Arc::new(FileStoreFactory {
                sync: self.sync_on_flush,
            }),
        }
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("read_cache_capacity", &self.read_cache_capacity)
            .field("sync_on_flush", &self.sync_on_flush)
            .finish_non_exhaustive()
    }
}
