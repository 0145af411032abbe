// src/models/did.rs
//! Decentralized Identifier (DID) document model.
//!
//! The package core treats a DID document as an opaque, immutable JSON value with
//! a canonical byte form. It reads the top-level `id` and the public keys of
//! the verification methods. The canonical form is JCS, so serializing a parsed
//! document reproduces the bytes that were published.

use crate::error::IdentityError;
use crate::utils::serialization::to_canonical_vec;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DID_DOC_LOCATION: &str = "diddoc";

/// Multicodec prefix of a secp256k1 public key (`secp256k1-pub`).
pub const SECP256K1_PUB_MULTICODEC: [u8; 2] = [0xe7, 0x01];

fn compressed(key: &[u8]) -> Option<Vec<u8>> {
    PublicKey::from_sec1_bytes(key)
        .ok()
        .map(|key| key.to_encoded_point(true).as_bytes().to_vec())
}

/// A DID document bound to its identifier.
///
/// # DID Format
/// The `id` field follows DID syntax:
/// ```text
/// did:<method>:<method-specific-id>
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct DidDocument {
    id: String,
    document: Value,
}

impl DidDocument {
    /// Wraps a JSON document, requiring a string `id` member that looks like a DID.
    pub fn from_value(document: Value) -> Result<Self, IdentityError> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| IdentityError::malformed(DID_DOC_LOCATION, "missing string `id`"))?
            .to_string();
        if !id.starts_with("did:") || id.split(':').count() < 3 {
            return Err(IdentityError::malformed(DID_DOC_LOCATION, format!("`{}` is not a DID", id)));
        }
        Ok(DidDocument { id, document })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let document: Value =
            serde_json::from_slice(bytes).map_err(|e| IdentityError::malformed(DID_DOC_LOCATION, e))?;
        Self::from_value(document)
    }

    /// The DID this document describes.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    /// Canonical bytes, as published to the content store.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        to_canonical_vec(&self.document).map_err(|e| IdentityError::malformed(DID_DOC_LOCATION, e))
    }

    /// Compressed secp256k1 keys the document lists for verification.
    ///
    /// Keys are read from `verificationMethod[*]` (`publicKeyBase58` or
    /// `publicKeyHex`) and, for `did:key` identifiers, from the identifier
    /// itself. Entries that do not decode to a secp256k1 point are skipped.
    pub fn verification_keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        if let Some(fingerprint) = self.id.strip_prefix("did:key:z") {
            if let Ok(bytes) = bs58::decode(fingerprint).into_vec() {
                if let Some(key) = bytes.strip_prefix(SECP256K1_PUB_MULTICODEC.as_slice()) {
                    keys.extend(compressed(key));
                }
            }
        }

        let methods = self
            .document
            .get("verificationMethod")
            .and_then(Value::as_array);
        for method in methods.into_iter().flatten() {
            let raw = if let Some(encoded) = method.get("publicKeyBase58").and_then(Value::as_str) {
                bs58::decode(encoded).into_vec().ok()
            } else if let Some(encoded) = method.get("publicKeyHex").and_then(Value::as_str) {
                ethers::utils::hex::decode(encoded).ok()
            } else {
                None
            };
            if let Some(key) = raw.as_deref().and_then(compressed) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Whether `public_key` (SEC1, either form) is one of the document's keys.
    pub fn authorizes(&self, public_key: &[u8]) -> bool {
        match compressed(public_key) {
            Some(key) => self.verification_keys().contains(&key),
            None => false,
        }
    }
}

impl TryFrom<Value> for DidDocument {
    type Error = IdentityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        DidDocument::from_value(value)
    }
}

impl From<DidDocument> for Value {
    fn from(doc: DidDocument) -> Self {
        doc.document
    }
}
