//! Signature checks and threshold counting.

use base64::Engine as _;
use ed25519_dalek::{Signature as Ed25519Signature, Verifier};
use std::collections::BTreeSet;

use super::Signature;
use crate::error::VerifyError;
use crate::keys::{Key, KeyRegistry};

/// Check one signature over `payload` against `key`.
///
/// Any malformed input (keyid mismatch, bad base64, bad key material) is
/// reported as an invalid signature, never as an error.
pub fn verify_signature(payload: &[u8], signature: &Signature, key: &Key) -> bool {
    if signature.keyid != key.keyid {
        return false;
    }
    let Ok(verifying_key) = key.verifying_key() else {
        return false;
    };
    let Ok(sig_bytes) = base64::engine::general_purpose::STANDARD.decode(&signature.sig) else {
        return false;
    };
    let Ok(sig) = Ed25519Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(payload, &sig).is_ok()
}

/// Distinct authorized keyids with a valid signature over `payload`.
///
/// Signatures by keys outside `authorized` or missing from the registry are
/// ignored, and a keyid is counted once however often it signed.
pub fn valid_signers(
    payload: &[u8],
    signatures: &[Signature],
    authorized: &BTreeSet<String>,
    registry: &KeyRegistry,
) -> BTreeSet<String> {
    signatures
        .iter()
        .filter(|signature| authorized.contains(&signature.keyid))
        .filter_map(|signature| {
            let key = registry.resolve(&signature.keyid).ok()?;
            verify_signature(payload, signature, key).then(|| signature.keyid.clone())
        })
        .collect()
}

/// Require at least `threshold` distinct valid authorized signers.
pub fn verify_threshold(
    item: &str,
    payload: &[u8],
    signatures: &[Signature],
    authorized: &BTreeSet<String>,
    threshold: usize,
    registry: &KeyRegistry,
) -> Result<BTreeSet<String>, VerifyError> {
    let signers = valid_signers(payload, signatures, authorized, registry);
    tracing::debug!(
        item,
        valid = signers.len(),
        required = threshold,
        total = signatures.len(),
        "counted signatures"
    );

    if signers.len() < threshold {
        return Err(VerifyError::Threshold {
            item: item.to_string(),
            required: threshold,
            valid: signers.len(),
        });
    }
    Ok(signers)
}
