// src/wallet/did_builder.rs
//! DID document construction from a keypair.
//!
//! [`KeyDidBuilder`] implements the `did:key` method for secp256k1 keys: the
//! identifier is the multibase (base58btc, `z`) encoding of the multicodec
//! `secp256k1-pub` prefix (`0xe7 0x01`) followed by the compressed public key.

use crate::error::IdentityError;
use crate::models::did::SECP256K1_PUB_MULTICODEC;
use crate::models::{DidDocument, Keypair};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use serde_json::json;

pub trait DidDocumentBuilder: Send + Sync {
    fn build(&self, keypair: &Keypair) -> Result<DidDocument, IdentityError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyDidBuilder;

impl KeyDidBuilder {
    /// Multibase fingerprint of a public key (`z...`).
    pub fn fingerprint(public_key: &[u8]) -> Result<String, IdentityError> {
        let key = PublicKey::from_sec1_bytes(public_key)
            .map_err(|e| IdentityError::malformed("public key", e))?;
        let mut bytes = SECP256K1_PUB_MULTICODEC.to_vec();
        bytes.extend_from_slice(key.to_encoded_point(true).as_bytes());
        Ok(format!("z{}", bs58::encode(bytes).into_string()))
    }
}

impl DidDocumentBuilder for KeyDidBuilder {
    fn build(&self, keypair: &Keypair) -> Result<DidDocument, IdentityError> {
        let fingerprint = Self::fingerprint(&keypair.public_key)?;
        let did = format!("did:key:{}", fingerprint);
        let method_id = format!("{}#{}", did, fingerprint);
        let compressed = PublicKey::from_sec1_bytes(&keypair.public_key)
            .map_err(|e| IdentityError::malformed("public key", e))?
            .to_encoded_point(true);

        DidDocument::from_value(json!({
            "@context": [
                "https://www.w3.org/ns/did/v1",
                "https://w3id.org/security/suites/secp256k1-2019/v1"
            ],
            "id": did,
            "verificationMethod": [{
                "id": method_id,
                "type": "EcdsaSecp256k1VerificationKey2019",
                "controller": did,
                "publicKeyBase58": bs58::encode(compressed.as_bytes()).into_string()
            }],
            "authentication": [method_id],
            "assertionMethod": [method_id],
            "capabilityDelegation": [method_id],
            "capabilityInvocation": [method_id]
        }))
    }
}
