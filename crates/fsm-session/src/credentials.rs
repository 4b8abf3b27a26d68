//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Persisted bearer credential: one global slot of three keys.
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CredentialStoreError;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_TYPE_KEY: &str = "token_type";

/// Every key the session owner writes.
pub const CREDENTIAL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_TYPE_KEY];

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Opaque bearer credential issued at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_owned()
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl Credentials {
    /// Bearer credential without a refresh token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
        }
    }

    /// Value for the `Authorization` header: `<token_type> <token>`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    fn to_entries(&self) -> BTreeMap<String, String> {
        let mut entries = BTreeMap::new();
        entries.insert(ACCESS_TOKEN_KEY.to_owned(), self.access_token.clone());
        if let Some(refresh) = &self.refresh_token {
            entries.insert(REFRESH_TOKEN_KEY.to_owned(), refresh.clone());
        }
        entries.insert(TOKEN_TYPE_KEY.to_owned(), self.token_type.clone());
        entries
    }

    /// Rebuild a credential from stored entries.
    ///
    /// An empty slot holds no credential. Leftover keys without a usable
    /// access token are reported as corrupt so the owner clears them.
    fn from_entries(
        entries: &BTreeMap<String, String>,
    ) -> Result<Option<Self>, CredentialStoreError> {
        let Some(access_token) = entries
            .get(ACCESS_TOKEN_KEY)
            .filter(|token| !token.trim().is_empty())
        else {
            if CREDENTIAL_KEYS.iter().any(|key| entries.contains_key(*key)) {
                return Err(CredentialStoreError::Corrupt(
                    "credential slot has no access token".to_owned(),
                ));
            }
            return Ok(None);
        };
        Ok(Some(Self {
            access_token: access_token.clone(),
            refresh_token: entries.get(REFRESH_TOKEN_KEY).cloned(),
            token_type: entries
                .get(TOKEN_TYPE_KEY)
                .filter(|kind| !kind.trim().is_empty())
                .cloned()
                .unwrap_or_else(default_token_type),
        }))
    }
}

/// Secure key/value slot holding the session credential.
///
/// Written only by the session owner: on login/restore success and cleared
/// on logout or restore failure.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credential, if any.
    fn load(&self) -> Result<Option<Credentials>, CredentialStoreError>;
    /// Replace the persisted credential.
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError>;
    /// Remove every credential key.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

/// In-process store, used by tests and the mock console.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a credential, as left behind by an earlier visit.
    pub fn with_credentials(credentials: &Credentials) -> Self {
        Self {
            entries: RwLock::new(credentials.to_entries()),
        }
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Write a raw key, bypassing credential validation.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_owned(), value.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialStoreError> {
        Credentials::from_entries(&self.entries.read())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError> {
        *self.entries.write() = credentials.to_entries();
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        let mut entries = self.entries.write();
        for key in CREDENTIAL_KEYS {
            entries.remove(key);
        }
        Ok(())
    }
}

/// JSON key/value document on disk; `clear` removes the file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Option<BTreeMap<String, String>>, CredentialStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| CredentialStoreError::Corrupt(err.to_string()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialStoreError> {
        match self.read_entries()? {
            Some(entries) => Credentials::from_entries(&entries),
            None => Ok(None),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let document = serde_json::to_string_pretty(&credentials.to_entries())
            .map_err(|err| CredentialStoreError::Corrupt(err.to_string()))?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, document)?;
        restrict_permissions(&staging)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), "credential persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "credential cleared");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
