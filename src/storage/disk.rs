use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::error::{CloseErrors, GraphError, Result};

use super::cache::CachedStorageManager;
use super::metadata::MetadataStore;
use super::object::{StorageManager, StoreFactory};
use super::options::{StorageOptions, METADATA_FILE_NAME};

/// A storage root on disk: one metadata file plus named object stores.
///
/// Storage managers are created lazily and cached until [`close`]; the
/// registry lock is held across the check-then-create path so a name never
/// maps to two live handles.
///
/// [`close`]: PersistentGraphStore::close
pub struct PersistentGraphStore {
    name: String,
    root: PathBuf,
    opts: StorageOptions,
    factory: Arc<dyn StoreFactory>,
    metadata: Mutex<MetadataStore>,
    managers: Mutex<FxHashMap<String, Arc<dyn StorageManager>>>,
}

impl PersistentGraphStore {
    /// Opens the storage root at `path` with default options, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StorageOptions::default())
    }

    /// Opens the storage root at `path`, creating the directory and an empty
    /// metadata file when it does not exist yet.
    pub fn open_with(path: impl AsRef<Path>, opts: StorageOptions) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let name = root.display().to_string();
        let metadata_path = root.join(METADATA_FILE_NAME);
        let metadata = if root.exists() {
            let store = MetadataStore::load(&metadata_path, opts.sync_on_flush)
                .map_err(opening_error)?;
            info!(store = %name, "storage.open.load");
            store
        } else {
            fs::create_dir_all(&root).map_err(|err| GraphError::Opening(err.to_string()))?;
            let store = MetadataStore::create(&metadata_path, opts.sync_on_flush)
                .map_err(opening_error)?;
            info!(store = %name, "storage.open.create");
            store
        };
        Ok(Self {
            name,
            root,
            factory: opts.store_factory(),
            opts,
            metadata: Mutex::new(metadata),
            managers: Mutex::new(FxHashMap::default()),
        })
    }

    /// Name of the storage root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the storage root's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Options the root was opened with.
    pub fn options(&self) -> &StorageOptions {
        &self.opts
    }

    /// Live, mutable view of the metadata store.
    pub fn metadata(&self) -> MutexGuard<'_, MetadataStore> {
        self.metadata.lock()
    }

    /// Durably persists the metadata store.
    pub fn flush(&self) -> Result<()> {
        self.metadata.lock().flush().map_err(|err| match err {
            GraphError::Flushing(_) => err,
            other => GraphError::Flushing(other.to_string()),
        })
    }

    /// Reloads the metadata store from its last flushed state.
    pub fn rollback(&self) -> Result<()> {
        self.metadata.lock().rollback().map_err(opening_error)
    }

    /// Returns the storage manager called `name`.
    ///
    /// A missing manager is created when `create` is set or when on-disk data
    /// for it already exists; otherwise `Ok(None)` is returned.
    pub fn storage_manager(
        &self,
        name: &str,
        create: bool,
    ) -> Result<Option<Arc<dyn StorageManager>>> {
        let mut managers = self.managers.lock();
        if let Some(existing) = managers.get(name) {
            return Ok(Some(Arc::clone(existing)));
        }
        let path = self.root.join(name);
        if !create && !self.factory.exists(&path) {
            return Ok(None);
        }
        let raw = self.factory.open(name, &path).map_err(opening_error)?;
        let manager: Arc<dyn StorageManager> = Arc::new(CachedStorageManager::new(
            raw,
            self.opts.read_cache_capacity,
        ));
        managers.insert(name.to_owned(), Arc::clone(&manager));
        debug!(store = %self.name, manager = name, "storage.manager.create");
        Ok(Some(manager))
    }

    /// Names of all currently cached storage managers, sorted.
    pub fn storage_manager_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Flushes the metadata store and closes every cached storage manager.
    ///
    /// Every step is attempted; all failures are reported together.
    pub fn close(&self) -> Result<()> {
        let mut errors = CloseErrors::new(self.name.clone());
        if let Err(err) = self.metadata.lock().flush() {
            warn!(store = %self.name, error = %err, "storage.close.metadata_failed");
            errors.push(err);
        }
        let managers: Vec<(String, Arc<dyn StorageManager>)> =
            self.managers.lock().drain().collect();
        for (name, manager) in managers {
            if let Err(err) = manager.close() {
                warn!(store = %self.name, manager = %name, error = %err, "storage.close.manager_failed");
                errors.push(err);
            }
        }
        if errors.is_empty() {
            info!(store = %self.name, "storage.close");
            Ok(())
        } else {
            Err(GraphError::Closing(errors))
        }
    }
}

fn opening_error(err: GraphError) -> GraphError {
    match err {
        GraphError::Opening(_) => err,
        other => GraphError::Opening(other.to_string()),
    }
}
