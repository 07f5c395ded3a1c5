//! Credential encryption at rest.
//!
//! Processing settings store their API key as hex-encoded AES-256-GCM
//! ciphertext. The key is decrypted only when an AI call is about to be
//! made and is handed to the adapter as a [`SecretString`].
//!
//! The cipher key itself is resolved from, in priority order:
//! 1. a direct value in the settings file (local testing only)
//! 2. a file (Docker secrets, e.g. `/run/secrets/receiptflow_key`)
//! 3. an environment variable (default `RECEIPTFLOW_TOKEN_KEY`)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use secrecy::{ExposeSecret, SecretString};
use std::fs;

use crate::config::KeySource;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No key source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read key from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    /// The cipher key is not 64 hex characters.
    #[error("Cipher key must be 64 hex characters: {0}")]
    InvalidKey(#[source] hex::FromHexError),

    #[error("Could not encrypt credential")]
    Encrypt,

    /// Covers malformed hex, truncated input and authentication failure alike.
    #[error("Stored credential cannot be decrypted: {0}")]
    Undecryptable(&'static str),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Default environment variable holding the hex-encoded cipher key.
pub const TOKEN_KEY_ENV_VAR: &str = "RECEIPTFLOW_TOKEN_KEY";

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Resolves a secret from a direct value, a file, or an environment variable,
/// in that order. Empty strings are treated as "not provided".
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|e| SecretError::FileReadError {
                path: expanded,
                source: e,
            });
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
pub(crate) fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

/// AES-256-GCM cipher for stored API keys.
///
/// A stored key is hex(`nonce || ciphertext || tag`) with a fresh 12-byte
/// nonce per encryption.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}

impl CredentialCipher {
    pub fn from_key_source(source: &KeySource) -> Result<Self> {
        let key = resolve_secret(
            source.value.as_deref(),
            source.file.as_deref(),
            source.env_var.as_deref(),
        )?;
        Self::from_hex_key(key.expose_secret())
    }

    pub fn from_hex_key(key_hex: &str) -> Result<Self> {
        let mut key = [0u8; KEY_SIZE];
        hex::decode_to_slice(key_hex.trim(), &mut key).map_err(SecretError::InvalidKey)?;
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        })
    }

    /// Produces the form stored in a processing settings `key` field.
    pub fn encrypt(&self, api_key: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce).map_err(|_| SecretError::Encrypt)?;

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), api_key.as_bytes())
            .map_err(|_| SecretError::Encrypt)?;

        let mut stored = nonce.to_vec();
        stored.extend(sealed);
        Ok(hex::encode(stored))
    }

    /// Decrypts a stored key straight into a `SecretString`.
    pub fn decrypt(&self, stored_hex: &str) -> Result<SecretString> {
        let stored =
            hex::decode(stored_hex.trim()).map_err(|_| SecretError::Undecryptable("not hex"))?;
        if stored.len() <= NONCE_SIZE {
            return Err(SecretError::Undecryptable("too short"));
        }

        let (nonce, sealed) = stored.split_at(NONCE_SIZE);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| SecretError::Undecryptable("authentication failed"))?;

        String::from_utf8(plain)
            .map(SecretString::from)
            .map_err(|_| SecretError::Undecryptable("not UTF-8"))
    }
}
