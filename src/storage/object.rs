use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{GraphError, Result};

use super::with_suffix;

const STORE_MAGIC: [u8; 4] = *b"RGOS";
const STORE_FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 8 + 8;
const CRC_LEN: usize = 4;

/// File extension appended to every named object store.
pub const STORE_FILE_EXTENSION: &str = "db";

/// A named persistent object store addressed by location.
pub trait StorageManager: Send + Sync {
    /// Name the store was opened under.
    fn name(&self) -> &str;
    /// Stores a new object and returns its location.
    fn insert(&self, data: &[u8]) -> Result<u64>;
    /// Replaces the object at `loc`.
    fn update(&self, loc: u64, data: &[u8]) -> Result<()>;
    /// Fetches the object at `loc`.
    fn fetch(&self, loc: u64) -> Result<Option<Vec<u8>>>;
    /// Releases the object at `loc`.
    fn free(&self, loc: u64) -> Result<()>;
    /// Makes every change durable.
    fn flush(&self) -> Result<()>;
    /// Discards changes made since the last flush.
    fn rollback(&self) -> Result<()>;
    /// Flushes and releases the store. Later calls fail.
    fn close(&self) -> Result<()>;
}

/// Creates raw object stores for a storage root.
pub trait StoreFactory: Send + Sync {
    /// Returns true when on-disk data exists for the store at `path`.
    fn exists(&self, path: &Path) -> bool;
    /// Opens the store at `path`, creating it if needed.
    fn open(&self, name: &str, path: &Path) -> Result<Box<dyn StorageManager>>;
}

/// Factory producing [`FileStorageManager`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStoreFactory {
    /// Whether flushes call `fsync`.
    pub sync: bool,
}

impl StoreFactory for FileStoreFactory {
    fn exists(&self, path: &Path) -> bool {
        store_file(path).exists()
    }

    fn open(&self, name: &str, path: &Path) -> Result<Box<dyn StorageManager>> {
        Ok(Box::new(FileStorageManager::open(name, path, self.sync)?))
    }
}

fn store_file(path: &Path) -> PathBuf {
    with_suffix(path, STORE_FILE_EXTENSION)
}

fn record_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| GraphError::InvalidData(format!("object of {len} bytes is too large")))
}

#[derive(Default)]
struct StoreState {
    records: BTreeMap<u64, Vec<u8>>,
    next_loc: u64,
    closed: bool,
}

/// Object store kept in memory and written as a checksummed snapshot on flush.
pub struct FileStorageManager {
    name: String,
    file: PathBuf,
    sync: bool,
    state: Mutex<StoreState>,
}

impl FileStorageManager {
    /// Opens the store backed by `<path>.db`, loading it if present.
    pub fn open(name: &str, path: &Path, sync: bool) -> Result<Self> {
        let file = store_file(path);
        let state = if file.exists() {
            read_snapshot(&file)?
        } else {
            StoreState {
                next_loc: 1,
                ..StoreState::default()
            }
        };
        let manager = Self {
            name: name.to_owned(),
            file,
            sync,
            state: Mutex::new(state),
        };
        if !manager.file.exists() {
            manager.write_snapshot(&manager.state.lock())?;
        }
        debug!(store = name, file = %manager.file.display(), "object_store.open");
        Ok(manager)
    }

    fn ensure_open(&self, state: &StoreState) -> Result<()> {
        if state.closed {
            return Err(GraphError::InvalidData(format!(
                "storage manager {} is closed",
                self.name
            )));
        }
        Ok(())
    }

    fn write_snapshot(&self, state: &StoreState) -> Result<()> {
        let mut buf = Vec::with_capacity(HEADER_LEN + CRC_LEN);
        buf.extend_from_slice(&STORE_MAGIC);
        buf.extend_from_slice(&STORE_FORMAT_VERSION.to_be_bytes());
        buf.extend_from_slice(&state.next_loc.to_be_bytes());
        buf.extend_from_slice(&(state.records.len() as u64).to_be_bytes());
        for (loc, data) in &state.records {
            buf.extend_from_slice(&loc.to_be_bytes());
            buf.extend_from_slice(&record_len(data.len())?.to_be_bytes());
            buf.extend_from_slice(data);
        }
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());

        let tmp = with_suffix(&self.file, "tmp");
        {
            let mut out = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            out.write_all(&buf)?;
            if self.sync {
                out.sync_all()?;
            }
        }
        fs::rename(&tmp, &self.file)?;
        trace!(store = %self.name, bytes = buf.len(), "object_store.snapshot");
        Ok(())
    }
}

impl StorageManager for FileStorageManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, data: &[u8]) -> Result<u64> {
        record_len(data.len())?;
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        let loc = state.next_loc;
        state.next_loc += 1;
        state.records.insert(loc, data.to_vec());
        Ok(loc)
    }

    fn update(&self, loc: u64, data: &[u8]) -> Result<()> {
        record_len(data.len())?;
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        match state.records.get_mut(&loc) {
            Some(slot) => {
                *slot = data.to_vec();
                Ok(())
            }
            None => Err(GraphError::InvalidData(format!(
                "no object at location {loc} in {}",
                self.name
            ))),
        }
    }

    fn fetch(&self, loc: u64) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        self.ensure_open(&state)?;
        Ok(state.records.get(&loc).cloned())
    }

    fn free(&self, loc: u64) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        state.records.remove(&loc);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let state = self.state.lock();
        self.ensure_open(&state)?;
        self.write_snapshot(&state)
    }

    fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        *state = read_snapshot(&self.file)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;
        self.write_snapshot(&state)?;
        state.closed = true;
        state.records.clear();
        debug!(store = %self.name, "object_store.close");
        Ok(())
    }
}

fn read_snapshot(file: &Path) -> Result<StoreState> {
    let bytes = fs::read(file)?;
    let corrupt = |what: &str| GraphError::Corruption(format!("{}: {what}", file.display()));
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(corrupt("object store truncated"));
    }
    let (body, crc) = bytes.split_at(bytes.len() - CRC_LEN);
    let expected = u32::from_be_bytes(crc.try_into().map_err(|_| corrupt("crc missing"))?);
    if crc32fast::hash(body) != expected {
        return Err(corrupt("object store checksum mismatch"));
    }
    if body[0..4] != STORE_MAGIC {
        return Err(corrupt("bad object store magic"));
    }
    let mut cursor = Cursor { buf: body, pos: 4 };
    let version = u16::from_be_bytes(cursor.take::<2>().ok_or_else(|| corrupt("version"))?);
    if version != STORE_FORMAT_VERSION {
        return Err(corrupt("unsupported object store version"));
    }
    let next_loc = u64::from_be_bytes(cursor.take::<8>().ok_or_else(|| corrupt("next loc"))?);
    let count = u64::from_be_bytes(cursor.take::<8>().ok_or_else(|| corrupt("count"))?);
    let mut records = BTreeMap::new();
    for _ in 0..count {
        let loc = u64::from_be_bytes(cursor.take::<8>().ok_or_else(|| corrupt("record loc"))?);
        let len = u32::from_be_bytes(cursor.take::<4>().ok_or_else(|| corrupt("record len"))?);
        let data = cursor
            .take_slice(len as usize)
            .ok_or_else(|| corrupt("record truncated"))?;
        records.insert(loc, data.to_vec());
    }
    Ok(StoreState {
        records,
        next_loc,
        closed: false,
    })
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.take_slice(N)?;
        slice.try_into().ok()
    }

    fn take_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }
}
