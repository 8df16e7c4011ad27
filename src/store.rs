//! Session storage for the Turnier client
//!
//! The session lives in a flat string key/value store. The canonical entry is
//! the JSON bundle under [`SESSION_KEY`]; older clients wrote bare tokens under
//! the keys in [`LEGACY_TOKEN_KEYS`] and those are still read and written.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use turnier_protocol::{SessionRecord, SessionUser};

use crate::error::{Result, TurnierError};

/// Key of the primary session bundle
pub const SESSION_KEY: &str = "session";

/// Flat token keys from older clients, in read precedence order
pub const LEGACY_TOKEN_KEYS: [&str; 2] = ["token", "authToken"];

/// Flat user object from older clients
pub const LEGACY_USER_KEY: &str = "user";

/// Anything shorter is not a token
const MIN_TOKEN_LEN: usize = 6;

/// Values older clients stored when they meant "no token"
const EMPTY_SENTINELS: [&str; 2] = ["null", "undefined"];

/// String key/value persistence, the shape of the browser's localStorage
pub trait SessionStorage: Send + Sync + fmt::Debug {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove all of `keys`. Every key is attempted even when one fails; the
    /// first error is returned.
    fn remove_items(&self, keys: &[&str]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove_item(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.items).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        lock(&self.items).remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object on disk, written through on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is treated the same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = Self::load_items(&path);
        Self {
            path,
            items: Mutex::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_items(path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return BTreeMap::new();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read session storage {}: {}", path.display(), e);
                return BTreeMap::new();
            }
        };

        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                "Session storage {} is corrupt, ignoring it: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        })
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TurnierError::directory("Creating session directory", e))?;
        }

        let content = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, content)
            .map_err(|e| TurnierError::storage_write("Writing session storage", e))?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = lock(&self.items);
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.remove_items(&[key])
    }

    /// Drops the keys from memory first and writes the file once, so a failed
    /// write still leaves the keys unreadable in this process.
    fn remove_items(&self, keys: &[&str]) -> Result<()> {
        let mut items = lock(&self.items);
        let mut changed = false;
        for key in keys {
            changed |= items.remove(*key).is_some();
        }
        if changed {
            self.persist(&items)?;
        }
        Ok(())
    }
}

/// Single source of truth for the session token and session record.
///
/// No other component writes session keys to storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// The current token: bundle first, then legacy keys in order.
    pub fn get_token(&self) -> Option<String> {
        let from_bundle = self.get_session().and_then(|record| record.token);

        from_bundle
            .into_iter()
            .chain(
                LEGACY_TOKEN_KEYS
                    .iter()
                    .filter_map(|key| self.storage.get_item(key)),
            )
            .map(|candidate| candidate.trim().to_string())
            .find(|candidate| looks_like_token(candidate))
    }

    /// Replace the token, keeping every other field of the bundle.
    pub fn set_token(&self, new_token: &str) -> Result<()> {
        let mut record = self.get_session().unwrap_or_default();
        record.token = Some(new_token.to_string());
        self.write_session(&record)?;

        for key in LEGACY_TOKEN_KEYS {
            self.storage.set_item(key, new_token)?;
        }
        debug!("Stored new session token");
        Ok(())
    }

    /// Persist a complete record, as produced by a login.
    pub fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.write_session(record)?;

        match record.token.as_deref() {
            Some(token) => {
                for key in LEGACY_TOKEN_KEYS {
                    self.storage.set_item(key, token)?;
                }
            }
            None => {
                for key in LEGACY_TOKEN_KEYS {
                    self.storage.remove_item(key)?;
                }
            }
        }
        Ok(())
    }

    /// The primary bundle, if present and readable.
    pub fn get_session(&self) -> Option<SessionRecord> {
        let raw = self.storage.get_item(SESSION_KEY)?;
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring corrupt session bundle: {}", e);
                None
            }
        }
    }

    /// User display data: bundle first, then the legacy flat key.
    pub fn get_user(&self) -> Option<SessionUser> {
        if let Some(user) = self.get_session().and_then(|record| record.user) {
            return Some(user);
        }

        let raw = self.storage.get_item(LEGACY_USER_KEY)?;
        match serde_json::from_str::<SessionUser>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring corrupt legacy user entry: {}", e);
                None
            }
        }
    }

    /// Remove every key that may hold session data. Safe to call repeatedly.
    ///
    /// All keys are removed even if persisting the removal fails; the error
    /// is still returned.
    pub fn clear_session(&self) -> Result<()> {
        let [token_key, auth_token_key] = LEGACY_TOKEN_KEYS;
        self.storage
            .remove_items(&[SESSION_KEY, token_key, auth_token_key, LEGACY_USER_KEY])?;
        debug!("Cleared session storage");
        Ok(())
    }

    fn write_session(&self, record: &SessionRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.storage.set_item(SESSION_KEY, &raw)
    }
}

fn looks_like_token(candidate: &str) -> bool {
    candidate.len() >= MIN_TOKEN_LEN
        && !EMPTY_SENTINELS
            .iter()
            .any(|sentinel| candidate.eq_ignore_ascii_case(sentinel))
}
