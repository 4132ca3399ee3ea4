//! Persistence for learned registries.
//!
//! Registries are stored as JSON lists of lowercase words under keys of the
//! form `bolder_registry_<hostname>` (or `bolder_registry_global`).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::user_data_dir;
use crate::error::{StoreError, StoreResult};
use crate::scope::REGISTRY_KEY_PREFIX;

/// Key-value persistence for registries.
pub trait RegistryStore {
    /// Stored words for `key`, or `None` if nothing is stored.
    fn load(&self, key: &str) -> StoreResult<Option<Vec<String>>>;

    /// Replace the words stored under `key`.
    fn save(&mut self, key: &str, words: &[String]) -> StoreResult<()>;

    /// Every stored registry key, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Delete `key`. Returns `false` if it did not exist.
    fn remove(&mut self, key: &str) -> StoreResult<bool>;
}

impl<S: RegistryStore + ?Sized> RegistryStore for Box<S> {
    fn load(&self, key: &str) -> StoreResult<Option<Vec<String>>> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, words: &[String]) -> StoreResult<()> {
        (**self).save(key, words)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        (**self).remove(key)
    }
}

impl<S: RegistryStore + ?Sized> RegistryStore for &mut S {
    fn load(&self, key: &str) -> StoreResult<Option<Vec<String>>> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, words: &[String]) -> StoreResult<()> {
        (**self).save(key, words)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys()
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        (**self).remove(key)
    }
}

/// Process-local store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self, key: &str) -> StoreResult<Option<Vec<String>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, words: &[String]) -> StoreResult<()> {
        self.entries.insert(key.to_string(), words.to_vec());
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// One JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: Utf8PathBuf,
}

/// Default registry directory: `registries/` under the user data directory.
pub fn default_store_dir() -> Option<Utf8PathBuf> {
    user_data_dir().map(|dir| dir.join("registries"))
}

fn file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.json")
}

impl FileStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the registry files.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(file_name(key))
    }
}

impl RegistryStore for FileStore {
    fn load(&self, key: &str) -> StoreResult<Option<Vec<String>>> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let words = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(%path, "loaded registry");
        Ok(Some(words))
    }

    fn save(&mut self, key: &str, words: &[String]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let json = serde_json::to_string(words).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(%path, words = words.len(), "saved registry");
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut keys: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let key = name.strip_suffix(".json")?;
                key.starts_with(REGISTRY_KEY_PREFIX).then(|| key.to_string())
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&mut self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| (*w).to_string()).collect()
    }

    fn temp_store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().join("registries")).unwrap();
        (tmp, FileStore::new(dir))
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load("bolder_registry_global").unwrap(), None);
        store
            .save("bolder_registry_global", &words(&["python"]))
            .unwrap();
        assert_eq!(
            store.load("bolder_registry_global").unwrap(),
            Some(words(&["python"]))
        );
        assert!(store.remove("bolder_registry_global").unwrap());
        assert!(!store.remove("bolder_registry_global").unwrap());
    }

    #[test]
    fn file_store_persists_json_lists() {
        let (_tmp, mut store) = temp_store();
        assert_eq!(store.load("bolder_registry_docs.rs").unwrap(), None);
        store
            .save("bolder_registry_docs.rs", &words(&["tokio", "serde"]))
            .unwrap();

        let reopened = FileStore::new(store.dir().to_path_buf());
        assert_eq!(
            reopened.load("bolder_registry_docs.rs").unwrap(),
            Some(words(&["tokio", "serde"]))
        );
        let raw = fs::read_to_string(store.path_for("bolder_registry_docs.rs")).unwrap();
        assert_eq!(raw, r#"["tokio","serde"]"#);
    }

    #[test]
    fn keys_lists_only_registries() {
        let (_tmp, mut store) = temp_store();
        assert!(store.keys().unwrap().is_empty());
        store.save("bolder_registry_global", &[]).unwrap();
        store.save("bolder_registry_a.org", &[]).unwrap();
        fs::write(store.dir().join("notes.json"), "[]").unwrap();
        assert_eq!(
            store.keys().unwrap(),
            vec!["bolder_registry_a.org", "bolder_registry_global"]
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let (_tmp, mut store) = temp_store();
        store.save("bolder_registry_global", &[]).unwrap();
        fs::write(store.path_for("bolder_registry_global"), "{not json").unwrap();
        assert!(matches!(
            store.load("bolder_registry_global"),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn keys_are_sanitized_into_file_names() {
        let store = FileStore::new("/tmp/x");
        assert_eq!(
            store.path_for("bolder_registry_a/b:c").file_name(),
            Some("bolder_registry_a_b_c.json")
        );
    }
}
