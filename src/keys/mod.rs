//! Public keys and the key registry used during a verification run.
//!
//! Keys are Ed25519 only. A key's id is derived from its content: the
//! SHA-256 of the JCS canonical JSON of the key object without `keyid`,
//! so the same public key always yields the same id.

use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Key type and signature scheme identifier.
pub const ED25519: &str = "ed25519";

/// Number of keyid characters used in link file names.
pub const KEYID_PREFIX_LEN: usize = 8;

/// Errors for key loading and registry construction
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    Jcs(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("unsupported key type '{keytype}' with scheme '{scheme}'")]
    Unsupported { keytype: String, scheme: String },

    #[error("keyid mismatch: declared {declared}, computed {computed}")]
    KeyIdMismatch { declared: String, computed: String },

    #[error("keyid {keyid} is bound to two different public keys")]
    AmbiguousKey { keyid: String },

    #[error("no key with keyid {keyid}")]
    NotFound { keyid: String },
}

/// Public half of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Hex-encoded raw public key bytes
    pub public: String,
}

/// A public key as it appears in layouts and key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    #[serde(default)]
    pub keyid: String,
    pub keytype: String,
    pub scheme: String,
    pub keyval: KeyValue,
}

/// The hashed form of a key: everything except `keyid`.
#[derive(Serialize)]
struct KeyIdInput<'a> {
    keytype: &'a str,
    scheme: &'a str,
    keyval: &'a KeyValue,
}

impl Key {
    /// Build a key from an Ed25519 verifying key.
    pub fn from_verifying_key(verifying_key: &VerifyingKey) -> Result<Self, KeyError> {
        let mut key = Self {
            keyid: String::new(),
            keytype: ED25519.to_string(),
            scheme: ED25519.to_string(),
            keyval: KeyValue {
                public: hex::encode(verifying_key.as_bytes()),
            },
        };
        key.keyid = key.compute_keyid()?;
        Ok(key)
    }

    /// Content-derived keyid.
    pub fn compute_keyid(&self) -> Result<String, KeyError> {
        let input = KeyIdInput {
            keytype: &self.keytype,
            scheme: &self.scheme,
            keyval: &self.keyval,
        };
        let jcs_bytes =
            serde_json_canonicalizer::to_vec(&input).map_err(|e| KeyError::Jcs(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Fail unless the declared keyid matches the key content.
    pub fn check_keyid(&self) -> Result<(), KeyError> {
        let computed = self.compute_keyid()?;
        if computed != self.keyid {
            return Err(KeyError::KeyIdMismatch {
                declared: self.keyid.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Decode the public key material.
    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        if self.keytype != ED25519 || self.scheme != ED25519 {
            return Err(KeyError::Unsupported {
                keytype: self.keytype.clone(),
                scheme: self.scheme.clone(),
            });
        }
        let bytes =
            hex::decode(&self.keyval.public).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKey("key must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    /// First characters of the keyid, as used in link file names.
    pub fn short_id(&self) -> &str {
        let end = self.keyid.len().min(KEYID_PREFIX_LEN);
        &self.keyid[..end]
    }

    /// Parse a key from JSON or PEM (SubjectPublicKeyInfo) text.
    ///
    /// A JSON key without a `keyid` gets its computed id.
    pub fn from_text(text: &str) -> Result<Self, KeyError> {
        if text.trim_start().starts_with("-----BEGIN") {
            let verifying_key = VerifyingKey::from_public_key_pem(text)
                .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            return Self::from_verifying_key(&verifying_key);
        }

        let mut key: Key = serde_json::from_str(text)?;
        if key.keyid.is_empty() {
            key.keyid = key.compute_keyid()?;
        }
        key.check_keyid()?;
        Ok(key)
    }

    /// Load a key file.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        let text = fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Keys trusted for one verification run, indexed by keyid.
///
/// Built once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: BTreeMap<String, Key>,
}

impl KeyRegistry {
    /// Build a registry, checking every keyid against its key content.
    ///
    /// The same key may be supplied more than once; the same keyid with
    /// different material is [`KeyError::AmbiguousKey`].
    pub fn from_keys<I>(keys: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = Key>,
    {
        let mut registry = Self::default();
        for key in keys {
            if let Some(existing) = registry.keys.get(&key.keyid) {
                if existing != &key {
                    return Err(KeyError::AmbiguousKey { keyid: key.keyid });
                }
                continue;
            }
            key.check_keyid()?;
            registry.keys.insert(key.keyid.clone(), key);
        }
        Ok(registry)
    }

    /// Look up a key by id.
    pub fn resolve(&self, keyid: &str) -> Result<&Key, KeyError> {
        self.keys.get(keyid).ok_or_else(|| KeyError::NotFound {
            keyid: keyid.to_string(),
        })
    }

    pub fn contains(&self, keyid: &str) -> bool {
        self.keys.contains_key(keyid)
    }

    /// All keyids, sorted.
    pub fn keyids(&self) -> impl Iterator<Item = &String> {
        self.keys.keys()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
