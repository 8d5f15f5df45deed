use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::UserProfile;

pub const TOKEN_KEY: &str = "token";
pub const USER_INFO_KEY: &str = "userInfo";

/// Small synchronous key-value storage that survives restarts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.remove(key);
        Ok(())
    }
}

/// Key-value store backed by one JSON document on disk.
///
/// Writes go to `<file>.json.tmp` first and are renamed over the main file.
/// A missing or corrupted main file falls back to the temp file, then to
/// empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, path = %parent.display(), "failed to create storage dir");
            }
        }
        let data = load_document(&path);
        debug!(path = %path.display(), keys = data.len(), "opened file store");
        Self {
            path,
            inner: RwLock::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn persist(&self, data: &HashMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(key.to_owned(), value.to_owned());
        self.persist(&inner)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&inner)
    }
}

/// Loads the document at `path`, then its `.json.tmp` sibling when the main
/// file is missing or unreadable as JSON. Empty when neither parses.
fn load_document(path: &Path) -> HashMap<String, String> {
    let tmp = path.with_extension("json.tmp");
    for candidate in [path, tmp.as_path()] {
        let bytes = match std::fs::read(candidate) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(error = %e, path = %candidate.display(), "failed to read store file");
                continue;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => return entries,
            Err(e) => {
                warn!(error = %e, path = %candidate.display(), "store file is not valid JSON");
            }
        }
    }
    HashMap::new()
}

/// The client-local authentication state: the bearer token and the profile
/// it belongs to.
///
/// Every read goes to the store, so callers always see the latest write.
/// Write failures are logged and otherwise ignored; the in-process view may
/// then diverge from disk until the next successful write.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_token", &self.token().is_some())
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.store.get(USER_INFO_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "stored user profile is unreadable");
                None
            }
        }
    }

    pub fn establish(&self, token: &str, user: &UserProfile) {
        if let Err(e) = self.store.set(TOKEN_KEY, token) {
            warn!(error = %e, "failed to persist session token");
        }
        self.set_user(user);
    }

    pub fn set_user(&self, user: &UserProfile) {
        let result = serde_json::to_string(user)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(USER_INFO_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist user profile");
        }
    }

    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_INFO_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(error = %e, key, "failed to clear session entry");
            }
        }
    }
}
