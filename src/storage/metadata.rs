use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GraphError, Result};

use super::with_suffix;

const METADATA_FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    format_version: u16,
    entries: &'a BTreeMap<String, BTreeSet<String>>,
}

#[derive(Deserialize)]
struct MetadataFile {
    format_version: u16,
    entries: BTreeMap<String, BTreeSet<String>>,
}

/// Durable map of named string sets.
///
/// Changes stay in memory until [`MetadataStore::flush`]; a flush replaces
/// the file through a temporary copy so a crash never leaves a torn file.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, BTreeSet<String>>,
    dirty: bool,
    sync: bool,
}

impl MetadataStore {
    /// Creates an empty store and writes it to `path` immediately.
    pub fn create(path: impl AsRef<Path>, sync: bool) -> Result<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
            dirty: false,
            sync,
        };
        store.persist()?;
        debug!(path = %store.path.display(), "metadata.create");
        Ok(store)
    }

    /// Loads a store previously written to `path`.
    pub fn load(path: impl AsRef<Path>, sync: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        debug!(path = %path.display(), entries = entries.len(), "metadata.load");
        Ok(Self {
            path,
            entries,
            dirty: false,
            sync,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the set stored under `entry`, if any.
    pub fn get(&self, entry: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(entry)
    }

    /// Returns true when `value` is a member of `entry`.
    pub fn contains(&self, entry: &str, value: &str) -> bool {
        self.entries
            .get(entry)
            .is_some_and(|set| set.contains(value))
    }

    /// Adds `value` to `entry`. Returns false and leaves the store clean if it was present.
    pub fn insert(&mut self, entry: &str, value: &str) -> bool {
        if self.contains(entry, value) {
            return false;
        }
        self.entries
            .entry(entry.to_owned())
            .or_default()
            .insert(value.to_owned());
        self.dirty = true;
        trace!(entry, value, "metadata.insert");
        true
    }

    /// Adds every value to `entry`, returning how many were new.
    pub fn extend<'a, I>(&mut self, entry: &str, values: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        values
            .into_iter()
            .filter(|value| self.insert(entry, value))
            .count()
    }

    /// Removes `value` from `entry`. Empty sets are dropped.
    pub fn remove(&mut self, entry: &str, value: &str) -> bool {
        let Some(set) = self.entries.get_mut(entry) else {
            return false;
        };
        if !set.remove(value) {
            return false;
        }
        if set.is_empty() {
            self.entries.remove(entry);
        }
        self.dirty = true;
        true
    }

    /// Iterates over all entry names.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True when in-memory content differs from the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes pending changes to disk. A clean store is not rewritten.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.persist()
    }

    /// Discards in-memory changes by reloading the last flushed content.
    pub fn rollback(&mut self) -> Result<()> {
        self.entries = read_entries(&self.path)?;
        self.dirty = false;
        debug!(path = %self.path.display(), "metadata.rollback");
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let file = MetadataFileRef {
            format_version: METADATA_FORMAT_VERSION,
            entries: &self.entries,
        };
        let encoded = serde_json::to_vec(&file)
            .map_err(|err| GraphError::Flushing(err.to_string()))?;
        let tmp = with_suffix(&self.path, "tmp");
        {
            let mut out = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            out.write_all(&encoded)?;
            if self.sync {
                out.sync_all()?;
            }
        }
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        trace!(path = %self.path.display(), bytes = encoded.len(), "metadata.persist");
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(GraphError::Opening(format!(
                "metadata file {} does not exist",
                path.display()
            )))
        }
        Err(err) => return Err(GraphError::from(err)),
    };
    let file: MetadataFile = serde_json::from_slice(&bytes).map_err(|err| {
        GraphError::Corruption(format!("metadata file {}: {err}", path.display()))
    })?;
    if file.format_version != METADATA_FORMAT_VERSION {
        return Err(GraphError::Corruption(format!(
            "metadata file {} has unsupported format version {}",
            path.display(),
            file.format_version
        )));
    }
    Ok(file.entries)
}
