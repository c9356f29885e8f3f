//! Key-value stores for the persisted shutter state.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use shutter_traits::{BoxError, KeyValueStore};

use crate::error::{HwError, Result};
use crate::util::write_atomic;

/// In-memory store. Clones share the same map, so a test can keep a handle
/// while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent `put` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Successful `put` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    /// Seed a value without counting it as a write.
    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_vec());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BoxError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Io(std::io::Error::other("read refused"))));
        }
        let map = self.map.lock().map_err(|_| HwError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> std::result::Result<(), BoxError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Io(std::io::Error::other("write refused"))));
        }
        let mut map = self.map.lock().map_err(|_| HwError::Poisoned)?;
        map.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// TOML-file-backed store. Values live in memory and the whole file is
/// rewritten atomically on every `put`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, Vec<u8>>,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str::<BTreeMap<String, Vec<u8>>>(&text)
                .map_err(|e| HwError::Encoding(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "state file opened");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text =
            toml::to_string(&self.values).map_err(|e| HwError::Encoding(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BoxError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> std::result::Result<(), BoxError> {
        if self.values.get(key).is_some_and(|v| v.as_slice() == value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_vec());
        self.flush()?;
        Ok(())
    }
}
