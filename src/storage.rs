//! Key-value persistence.
//!
//! - `LocalStorage`: the browser's `localStorage` (wasm32 only)
//! - `FileStore`: one file per key in a directory (native)
//! - `MemoryStore`: a `HashMap`, for tests and throwaway sessions
//!
//! Values are whole JSON documents; the last write wins.

use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{MeasureError, MeasureResult};

/// A synchronous string store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> MeasureResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> MeasureResult<()>;
}

/// Read and decode the JSON value under `key`. `Ok(None)` when absent.
pub fn load_json<T, S>(store: &S, key: &str) -> MeasureResult<Option<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| MeasureError::PersistenceRead {
            key: key.to_owned(),
            source,
        })
}

/// Encode `value` as JSON and write it under `key`.
pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> MeasureResult<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access for seeding and inspection.
    pub fn entries_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> MeasureResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> MeasureResult<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Native store: each key is a `<key>.json` file under `root`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<std::path::PathBuf>) -> MeasureResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| MeasureError::storage(format!("{}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn path(&self, key: &str) -> std::path::PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> MeasureResult<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MeasureError::storage(format!("read {key}: {e}"))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> MeasureResult<()> {
        std::fs::write(self.path(key), value)
            .map_err(|e| MeasureError::storage(format!("write {key}: {e}")))
    }
}

/// Browser `localStorage`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorage {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    pub fn open() -> MeasureResult<Self> {
        let storage = web_sys::window()
            .ok_or_else(|| MeasureError::storage("no window"))?
            .local_storage()
            .map_err(to_storage_err)?
            .ok_or_else(|| MeasureError::storage("no localStorage"))?;
        Ok(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> MeasureResult<Option<String>> {
        self.storage.get_item(key).map_err(to_storage_err)
    }

    fn set(&mut self, key: &str, value: &str) -> MeasureResult<()> {
        self.storage.set_item(key, value).map_err(to_storage_err)
    }
}

#[cfg(target_arch = "wasm32")]
fn to_storage_err(e: wasm_bindgen::JsValue) -> MeasureError {
    MeasureError::storage(format!("{e:?}"))
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> MeasureResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> MeasureResult<()> {
        (**self).set(key, value)
    }
}

#[cfg(target_arch = "wasm32")]
fn open_persistent() -> MeasureResult<LocalStorage> {
    LocalStorage::open()
}

#[cfg(not(target_arch = "wasm32"))]
fn open_persistent() -> MeasureResult<FileStore> {
    FileStore::open(".patagon")
}

/// Open the viewer's store, falling back to memory when it is unavailable.
#[must_use]
pub fn open_platform_store() -> Box<dyn KeyValueStore> {
    match open_persistent() {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::warn!("{e}; measurements will not survive a reload");
            Box::new(MemoryStore::new())
        }
    }
}
