//! Secret storage for the signed-in session.
//!
//! A session persists as three independent entries (access token, refresh
//! token, user email) under one namespace. Backends:
//!
//! - [`KeyringTokenStore`]: the OS keychain (macOS Keychain, Windows
//!   Credential Manager, Secret Service), behind the `keychain` feature
//! - [`FileTokenStore`]: a JSON file with `0600` permissions, written
//!   atomically
//! - [`MemoryTokenStore`]: process-local, for tests and `--ephemeral` runs
//!
//! Every backend allows concurrent reads and serializes writes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ProviderError;

/// Keychain service name shared by all entries.
pub const DEFAULT_SERVICE: &str = "com.timedonut.app";

/// The three entries a session is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
    UserEmail,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [Self::AccessToken, Self::RefreshToken, Self::UserEmail];

    /// Entry name inside the store namespace.
    pub fn key(&self) -> &'static str {
        match self {
            Self::AccessToken => "timedonut.accessToken",
            Self::RefreshToken => "timedonut.refreshToken",
            Self::UserEmail => "timedonut.userEmail",
        }
    }
}

/// Errors raised by token store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "keychain")]
    #[error("keychain error on {key}: {source}")]
    Keychain {
        key: &'static str,
        #[source]
        source: keyring::Error,
    },

    #[error("failed to {action} token file {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        ProviderError::storage(e.to_string()).with_source(e)
    }
}

/// Keyed secret storage.
pub trait TokenStore: Send + Sync {
    /// Stores `value` under `kind`, replacing any previous value.
    fn save(&self, kind: TokenKind, value: &str) -> Result<(), StoreError>;

    /// Returns the stored value, `None` when the entry does not exist.
    fn retrieve(&self, kind: TokenKind) -> Result<Option<String>, StoreError>;

    /// Removes the entry. Removing a missing entry succeeds.
    fn delete(&self, kind: TokenKind) -> Result<(), StoreError>;

    /// Removes all three entries.
    ///
    /// Every entry is attempted even if an earlier one fails; the first
    /// failure is returned.
    fn delete_all(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for kind in TokenKind::ALL {
            if let Err(e) = self.delete(kind) {
                warn!(key = kind.key(), error = %e, "failed to delete token entry");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Token store backed by the OS keychain.
#[cfg(feature = "keychain")]
#[derive(Debug)]
pub struct KeyringTokenStore {
    service: String,
    lock: RwLock<()>,
}

#[cfg(feature = "keychain")]
impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, kind: TokenKind) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(&self.service, kind.key()).map_err(|source| StoreError::Keychain {
            key: kind.key(),
            source,
        })
    }
}

#[cfg(feature = "keychain")]
impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[cfg(feature = "keychain")]
impl TokenStore for KeyringTokenStore {
    fn save(&self, kind: TokenKind, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        self.entry(kind)?
            .set_password(value)
            .map_err(|source| StoreError::Keychain {
                key: kind.key(),
                source,
            })?;
        debug!(key = kind.key(), "saved keychain entry");
        Ok(())
    }

    fn retrieve(&self, kind: TokenKind) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        match self.entry(kind)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(source) => Err(StoreError::Keychain {
                key: kind.key(),
                source,
            }),
        }
    }

    fn delete(&self, kind: TokenKind) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        match self.entry(kind)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(source) => Err(StoreError::Keychain {
                key: kind.key(),
                source,
            }),
        }
    }
}

/// Token store persisted as a JSON object on disk.
///
/// The file is rewritten through a temporary file and a rename, and is
/// readable by the owner only.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Opens the store, loading existing entries if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                action: "read",
                path: path.clone(),
                source,
            })?;
            let entries = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "loaded token file");
            entries
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Default location: `<data dir>/timedonut/tokens.json`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timedonut")
            .join("tokens.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |action, source| StoreError::Io {
            action,
            path: self.path.clone(),
            source,
        };

        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => {
                    info!(path = %self.path.display(), "removed token file");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_err("remove", e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| io_err("write", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
                .map_err(|e| io_err("set permissions on", e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| io_err("rename", e))?;
        debug!(path = %self.path.display(), "saved token file");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, kind: TokenKind, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(kind.key().to_string(), value.to_string());
        self.persist(&entries)
    }

    fn retrieve(&self, kind: TokenKind) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(kind.key()).cloned())
    }

    fn delete(&self, kind: TokenKind) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(kind.key()).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.persist(&entries)
    }
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<TokenKind, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, kind: TokenKind, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, value.to_string());
        Ok(())
    }

    fn retrieve(&self, kind: TokenKind) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned())
    }

    fn delete(&self, kind: TokenKind) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
        Ok(())
    }
}
