//! Local key-value storage.
//!
//! The cache and queue sit on a string-to-string store with the same shape
//! as browser local storage. Two backends ship: an in-memory map and a
//! directory with one file per key.

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage key of the persisted bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

const FILE_SUFFIX: &str = ".json";

/// String key-value persistence.
///
/// A `set` either fully replaces the stored value or leaves the old one in
/// place.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under a key.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, sorted.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        let mut keys: Vec<_> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Replace `path` with `contents` atomically.
///
/// The bytes go to a uniquely named temporary file next to the target, are
/// synced, and the file is renamed over `path`. Runs on the blocking pool.
pub(crate) async fn write_atomic(path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

/// Directory-backed store with one file per key.
///
/// Readers see either the old or the new value of a key, never a partial
/// write.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}{}", encode_key(key), FILE_SUFFIX)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_atomic(path, value.as_bytes().to_vec()).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(encoded) = name.strip_suffix(FILE_SUFFIX) {
                if let Some(key) = decode_key(encoded) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Make a key safe as a file name: `%XX` for every byte outside
/// `[A-Za-z0-9_-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("val_cache_V1", "{\"a\":1}").await.unwrap();
        assert_eq!(
            store.get("val_cache_V1").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.set("val_cache_V1", "{\"a\":2}").await.unwrap();
        assert_eq!(
            store.get("val_cache_V1").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );

        store.set("val_sync_queue", "[]").await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["val_cache_V1".to_string(), "val_sync_queue".to_string()]
        );

        store.remove("val_cache_V1").await.unwrap();
        store.remove("val_cache_V1").await.unwrap();
        assert_eq!(store.get("val_cache_V1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn file_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileStore::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::open(dir.path())
            .await
            .unwrap()
            .set("auth_token", "secret")
            .await
            .unwrap();

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("auth_token").await.unwrap().as_deref(),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("val_sync_queue", "[]").await.unwrap();
        store.set("val_sync_queue", "[1]").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn file_store_odd_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        for key in ["val_cache_a/b", "val_cache_..", "val_cache_日本"] {
            store.set(key, "x").await.unwrap();
            assert_eq!(store.get(key).await.unwrap().as_deref(), Some("x"));
        }
        assert_eq!(store.keys().await.unwrap().len(), 3);
        assert!(store.set("", "x").await.is_err());
    }

    #[test]
    fn key_encoding() {
        assert_eq!(encode_key("val_cache_V-1"), "val_cache_V-1");
        assert_eq!(encode_key("a/b.c"), "a%2Fb%2Ec");
        assert_eq!(decode_key("a%2Fb%2Ec").as_deref(), Some("a/b.c"));
        assert_eq!(decode_key("bad%Z"), None);
    }
}
