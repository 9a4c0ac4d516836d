use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sitex_fs::AtomicWriteOptions;

use crate::{Error, Result};

/// A small key-value store holding JSON values.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Read-modify-write a single key. Returning `None` removes the key.
    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()>;

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut value = Some(value);
        self.update(key, &mut |_| value.take())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(key, &mut |_| None)
    }

    /// Append to the array under `key`, keeping only the newest `capacity` items.
    fn append(&self, key: &str, value: Value, capacity: usize) -> Result<()> {
        let mut value = Some(value);
        self.update(key, &mut |current| {
            let mut items = match current {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            items.extend(value.take());
            if items.len() > capacity {
                items.drain(..items.len() - capacity);
            }
            Some(Value::Array(items))
        })
    }
}

pub fn load<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| Error::Malformed {
                key: key.to_string(),
                source,
            }),
    }
}

pub fn save<T: Serialize>(store: &dyn StateStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        match f(values.remove(key)) {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {}
        }
        Ok(())
    }
}

/// A store persisted as one JSON object on disk.
///
/// Writes are atomic. Concurrent processes may overwrite each other's
/// updates; the store only coordinates threads within one process.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(Error::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_all(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(values)?;
        sitex_fs::atomic_write(&self.path, &bytes, AtomicWriteOptions::new().permissions(0o600))?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut values = self.read_all()?;
        match f(values.remove(key)) {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {}
        }
        self.write_all(&values)
    }
}
