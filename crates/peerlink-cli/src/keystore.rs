//! Host identity persistence
//!
//! A host that restarts keeps the endpoint id its clients were given. Only
//! the Ed25519 secret is stored; everything else is derived from it.

use std::io;
use std::path::{Path, PathBuf};

use iroh::SecretKey;
use thiserror::Error;
use tracing::{debug, info};

const KEY_FILENAME: &str = "identity.key";
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid key file {path}: expected 32 bytes, got {actual}")]
    InvalidKey { path: PathBuf, actual: usize },
}

/// Directory-backed store for the host secret key
#[derive(Debug, Clone)]
pub struct Keystore {
    path: PathBuf,
}

impl Keystore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.to_path_buf(),
        }
    }

    pub fn key_path(&self) -> PathBuf {
        self.path.join(KEY_FILENAME)
    }

    pub fn exists(&self) -> bool {
        self.key_path().exists()
    }

    /// Load the stored key, creating and saving one on first use
    pub fn load_or_generate(&self) -> Result<SecretKey, KeystoreError> {
        if self.exists() {
            return self.load();
        }

        info!("No existing identity found, generating new key");
        let key = SecretKey::generate(&mut rand::rng());
        self.save(&key)?;
        Ok(key)
    }

    pub fn load(&self) -> Result<SecretKey, KeystoreError> {
        let path = self.key_path();
        let bytes = std::fs::read(&path).map_err(|source| KeystoreError::Io {
            action: "read",
            path: path.clone(),
            source,
        })?;

        let key_bytes: [u8; KEY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| KeystoreError::InvalidKey {
                    path: path.clone(),
                    actual: bytes.len(),
                })?;

        let key = SecretKey::from_bytes(&key_bytes);
        debug!(identity = %key.public().fmt_short(), "Loaded identity from keystore");
        Ok(key)
    }

    pub fn save(&self, key: &SecretKey) -> Result<(), KeystoreError> {
        std::fs::create_dir_all(&self.path).map_err(|source| KeystoreError::Io {
            action: "create",
            path: self.path.clone(),
            source,
        })?;

        let path = self.key_path();
        std::fs::write(&path, key.to_bytes()).map_err(|source| KeystoreError::Io {
            action: "write",
            path: path.clone(),
            source,
        })?;
        restrict_permissions(&path)?;

        info!(
            identity = %key.public().fmt_short(),
            path = %path.display(),
            "Saved identity to keystore"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), KeystoreError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        KeystoreError::Io {
            action: "restrict permissions on",
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), KeystoreError> {
    Ok(())
}
