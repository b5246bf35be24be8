use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::Result;

use super::object::StorageManager;

/// Read cache placed in front of a raw object store.
///
/// Writes go to the wrapped store first and then refresh the cached copy;
/// rollback and close drop the whole cache. The cache lock is held across
/// every call into the wrapped store, so a read miss can never cache a value
/// that a concurrent write already replaced.
pub struct CachedStorageManager {
    inner: Box<dyn StorageManager>,
    cache: Mutex<LruCache<u64, Vec<u8>>>,
}

impl CachedStorageManager {
    /// Wraps `inner` with a cache holding at most `capacity` objects.
    pub fn new(inner: Box<dyn StorageManager>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of objects currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Maximum number of cached objects.
    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }
}

impl StorageManager for CachedStorageManager {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn insert(&self, data: &[u8]) -> Result<u64> {
        let mut cache = self.cache.lock();
        let loc = self.inner.insert(data)?;
        cache.put(loc, data.to_vec());
        Ok(loc)
    }

    fn update(&self, loc: u64, data: &[u8]) -> Result<()> {
        let mut cache = self.cache.lock();
        self.inner.update(loc, data)?;
        cache.put(loc, data.to_vec());
        Ok(())
    }

    fn fetch(&self, loc: u64) -> Result<Option<Vec<u8>>> {
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&loc) {
            trace!(store = self.inner.name(), loc, "object_cache.hit");
            return Ok(Some(hit.clone()));
        }
        let fetched = self.inner.fetch(loc)?;
        if let Some(data) = &fetched {
            cache.put(loc, data.clone());
        }
        Ok(fetched)
    }

    fn free(&self, loc: u64) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.pop(&loc);
        self.inner.free(loc)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn rollback(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.clear();
        self.inner.rollback()
    }

    fn close(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.clear();
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object::FileStorageManager;

    #[test]
    fn evicts_beyond_capacity_but_still_reads_through() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let raw = FileStorageManager::open("s", &dir.path().join("s"), false)?;
        let cached = CachedStorageManager::new(Box::new(raw), 2);
        let locs: Vec<u64> = (0..4u8)
            .map(|i| cached.insert(&[i]))
            .collect::<Result<_>>()?;
        assert_eq!(cached.cached_len(), 2);
        assert_eq!(cached.fetch(locs[0])?, Some(vec![0]));
        assert_eq!(cached.capacity(), 2);
        Ok(())
    }

    #[test]
    fn rollback_clears_cached_writes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let raw = FileStorageManager::open("s", &dir.path().join("s"), false)?;
        let cached = CachedStorageManager::new(Box::new(raw), 16);
        let loc = cached.insert(b"one")?;
        cached.flush()?;
        cached.update(loc, b"two")?;
        cached.rollback()?;
        assert_eq!(cached.fetch(loc)?, Some(b"one".to_vec()));
        Ok(())
    }

    #[test]
    fn concurrent_reads_never_cache_stale_values() -> Result<()> {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir()?;
        let raw = FileStorageManager::open("s", &dir.path().join("s"), false)?;
        let cached = Arc::new(CachedStorageManager::new(Box::new(raw), 1));
        let loc = cached.insert(&0u32.to_be_bytes())?;
        let other = cached.insert(b"other")?;

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cached = Arc::clone(&cached);
                thread::spawn(move || -> Result<()> {
                    for _ in 0..500 {
                        cached.fetch(loc)?;
                        // evicts `loc` so the next read misses
                        cached.fetch(other)?;
                    }
                    Ok(())
                })
            })
            .collect();
        for value in 1..=500u32 {
            cached.update(loc, &value.to_be_bytes())?;
        }
        for reader in readers {
            reader.join().expect("reader panicked")?;
        }

        assert_eq!(cached.fetch(loc)?, Some(500u32.to_be_bytes().to_vec()));
        cached.free(loc)?;
        assert_eq!(cached.fetch(loc)?, None);
        Ok(())
    }
}
