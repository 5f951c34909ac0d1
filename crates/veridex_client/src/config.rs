//! Client configuration: pinned signing key and directory addresses.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use veridex_primitives::Pk32;

/// Size of the directory signing public key, hex-encoded on disk.
pub const SIGN_PUBKEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("signing key is not valid hex")]
    BadKeyEncoding(#[from] hex::FromHexError),
    #[error("signing key must be 32 bytes (got {0})")]
    BadKeyLength(usize),
}

/// Configuration needed to talk to one directory: where to send requests and
/// which signing key to pin. Relative paths are resolved against the config
/// file's own directory.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Path to the directory's hex-encoded signing public key.
    pub sign_pubkey_path: String,
    /// Address for lookup and monitoring requests.
    pub address: String,
    /// Registration endpoint; falls back to `address` when unset.
    pub registration_address: Option<String>,
    /// Parsed signing key; populated by [`ClientConfig::load`].
    #[serde(skip)]
    pub sign_pk: Pk32,
}

impl ClientConfig {
    /// Read the config file and the signing-key file it points at.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut conf: Self = toml::from_str(&raw)?;

        let key_path = resolve_path(&conf.sign_pubkey_path, path);
        let key_hex = fs::read_to_string(&key_path).map_err(|source| ConfigError::Io {
            path: key_path,
            source,
        })?;
        let key = hex::decode(key_hex.trim())?;
        if key.len() != SIGN_PUBKEY_BYTES {
            return Err(ConfigError::BadKeyLength(key.len()));
        }
        conf.sign_pk.copy_from_slice(&key);
        Ok(conf)
    }

    /// Endpoint for registration requests.
    #[must_use]
    pub fn registration_endpoint(&self) -> &str {
        self.registration_address.as_deref().unwrap_or(&self.address)
    }
}

/// Resolve `path` relative to the directory containing `config_file`.
fn resolve_path(path: &str, config_file: &Path) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        config_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(p)
    }
}
