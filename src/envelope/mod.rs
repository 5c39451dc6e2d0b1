//! Signed metadata envelopes (DSSE).
//!
//! Layouts and links travel as DSSE envelopes. The payload is the JCS
//! canonical JSON of the metadata, and every signature covers the
//! pre-authentication encoding (PAE) of payload type and payload bytes.
//! Verification always uses the payload bytes exactly as received.

mod threshold;

pub use threshold::{valid_signers, verify_signature, verify_threshold};

use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::keys::{Key, KeyError};

/// Payload type of in-toto metadata.
pub const PAYLOAD_TYPE: &str = "application/vnd.in-toto+json";

/// Errors for envelope encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JCS canonicalization error: {0}")]
    Jcs(String),

    #[error("unexpected payload type '{actual}', expected '{expected}'")]
    PayloadType { expected: String, actual: String },

    #[error("signing key error: {0}")]
    Key(#[from] KeyError),
}

/// One signature of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub keyid: String,

    /// Base64-encoded Ed25519 signature over the PAE
    pub sig: String,
}

/// DSSE envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Base64-encoded payload bytes
    pub payload: String,

    pub payload_type: String,

    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// Pre-authentication encoding:
/// `"DSSEv1" SP len(type) SP type SP len(payload) SP payload`.
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let header = format!(
        "DSSEv1 {} {} {} ",
        payload_type.len(),
        payload_type,
        payload.len()
    );
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(payload);
    bytes
}

impl Envelope {
    /// Wrap metadata as an unsigned envelope with a JCS payload.
    pub fn from_metadata<T: Serialize>(metadata: &T) -> Result<Self, EnvelopeError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(metadata)
            .map_err(|e| EnvelopeError::Jcs(e.to_string()))?;

        Ok(Self {
            payload: base64::engine::general_purpose::STANDARD.encode(jcs_bytes),
            payload_type: PAYLOAD_TYPE.to_string(),
            signatures: Vec::new(),
        })
    }

    /// Decoded payload bytes.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(base64::engine::general_purpose::STANDARD.decode(&self.payload)?)
    }

    /// The bytes every signature of this envelope covers.
    pub fn signed_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        if self.payload_type != PAYLOAD_TYPE {
            return Err(EnvelopeError::PayloadType {
                expected: PAYLOAD_TYPE.to_string(),
                actual: self.payload_type.clone(),
            });
        }
        Ok(pae(&self.payload_type, &self.payload_bytes()?))
    }

    /// Append a signature made with `signing_key`.
    pub fn sign(&mut self, signing_key: &SigningKey) -> Result<(), EnvelopeError> {
        let key = Key::from_verifying_key(&signing_key.verifying_key())?;
        let signature = signing_key.sign(&self.signed_bytes()?);

        self.signatures.push(Signature {
            keyid: key.keyid,
            sig: base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()),
        });
        Ok(())
    }

    /// Decode the payload as typed metadata.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        Ok(serde_json::from_slice(&self.payload_bytes()?)?)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, EnvelopeError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pae_layout() {
        assert_eq!(
            pae("application/example", b"hello"),
            b"DSSEv1 19 application/example 5 hello".to_vec()
        );
        assert_eq!(pae("", b""), b"DSSEv1 0  0 ".to_vec());
    }

    #[test]
    fn test_payload_is_canonical() {
        let a = Envelope::from_metadata(&json!({"b": 1, "a": [true, null]})).unwrap();
        let b = Envelope::from_metadata(&json!({"a": [true, null], "b": 1})).unwrap();

        assert_eq!(a.payload, b.payload);
        assert_eq!(a.payload_bytes().unwrap(), br#"{"a":[true,null],"b":1}"#.to_vec());
    }

    #[test]
    fn test_sign_appends_keyed_signature() {
        let signing_key = SigningKey::from_bytes(&[3; 32]);
        let key = Key::from_verifying_key(&signing_key.verifying_key()).unwrap();

        let mut envelope = Envelope::from_metadata(&json!({"_type": "link"})).unwrap();
        envelope.sign(&signing_key).unwrap();

        assert_eq!(envelope.signatures.len(), 1);
        assert_eq!(envelope.signatures[0].keyid, key.keyid);
        assert!(verify_signature(
            &envelope.signed_bytes().unwrap(),
            &envelope.signatures[0],
            &key
        ));
    }

    #[test]
    fn test_wrong_payload_type_is_rejected() {
        let mut envelope = Envelope::from_metadata(&json!({})).unwrap();
        envelope.payload_type = "text/plain".to_string();
        assert!(matches!(
            envelope.signed_bytes(),
            Err(EnvelopeError::PayloadType { .. })
        ));
    }

    #[test]
    fn test_envelope_json_field_names() {
        let envelope = Envelope::from_metadata(&json!({"x": 1})).unwrap();
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["payloadType"], PAYLOAD_TYPE);
        assert!(value["signatures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_file_io() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("root.layout");
        let mut envelope = Envelope::from_metadata(&json!({"_type": "layout"})).unwrap();
        envelope.sign(&SigningKey::from_bytes(&[1; 32])).unwrap();

        envelope.write_to_file(&path).unwrap();
        assert_eq!(Envelope::from_file(&path).unwrap(), envelope);
    }
}
