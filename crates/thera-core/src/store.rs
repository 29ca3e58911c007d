use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::TheraError;

/// Storage key for the single serialized credential blob.
pub const CREDENTIAL_KEY: &str = "user-jwt";

/// Platform-abstracted durable key-value storage for credentials.
///
/// Mobile shells implement this over Keychain / Android Keystore;
/// desktop builds can use [`KeyringCredentialStore`]. The auth session
/// manager is the only component that reads or writes through it.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, TheraError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), TheraError>;
    async fn remove(&self, key: &str) -> Result<(), TheraError>;
}

/// File-backed credential store, one file per key under a data directory.
///
/// Fallback for platforms without an OS credential service.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(data_dir: &str) -> Self {
        Self {
            dir: PathBuf::from(data_dir),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, TheraError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TheraError::Storage(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), TheraError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| TheraError::Storage(e.to_string()))?;
        std::fs::write(self.path_for(key), value).map_err(|e| TheraError::Storage(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), TheraError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TheraError::Storage(e.to_string())),
        }
    }
}

/// Credential store backed by the OS keyring
/// (Keychain / libsecret / Credential Manager).
#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub struct KeyringCredentialStore {
    service: String,
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
impl KeyringCredentialStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, TheraError> {
        keyring::Entry::new(&self.service, key).map_err(|e| TheraError::Storage(e.to_string()))
    }
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, TheraError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TheraError::Storage(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), TheraError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| TheraError::Storage(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), TheraError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(TheraError::Storage(e.to_string())),
        }
    }
}
