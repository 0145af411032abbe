// src/models/signature.rs
//! Signature document (`signature.xml`) of an identity package.
//!
//! The signature covers the metadata document's CID string, not its bytes, so the
//! integrity chain reads: token → root reference → metadata CID → signature.

use crate::error::IdentityError;
use crate::models::pointer::Cid;
use crate::utils::serialization::{from_slice, to_canonical_vec};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const SIGNATURE_FILE: &str = "signature.xml";
pub const SIGNATURE_ALGORITHM: &str = "ES256K-KECCAK256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDocument {
    /// CID of the signed metadata document
    #[serde(rename = "signedCid")]
    pub signed_cid: Cid,
    /// DID of the signer
    pub signer: String,
    /// Hex-encoded compressed public key
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub algorithm: String,
    /// Base64-encoded compact (r || s) signature
    pub value: String,
    pub date: NaiveDate,
}

impl SignatureDocument {
    pub fn new(
        signed_cid: Cid,
        signer: &str,
        public_key: &[u8],
        signature: &[u8],
        date: NaiveDate,
    ) -> Self {
        SignatureDocument {
            signed_cid,
            signer: signer.to_string(),
            public_key: ethers::utils::hex::encode(public_key),
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            value: base64::encode(signature),
            date,
        }
    }

    /// Bytes the signature was computed over.
    pub fn payload(&self) -> &[u8] {
        self.signed_cid.as_str().as_bytes()
    }

    pub fn public_key_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        ethers::utils::hex::decode(&self.public_key)
            .map_err(|e| IdentityError::malformed(SIGNATURE_FILE, e))
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        base64::decode(&self.value).map_err(|e| IdentityError::malformed(SIGNATURE_FILE, e))
    }

    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        to_canonical_vec(self).map_err(|e| IdentityError::malformed(SIGNATURE_FILE, e))
    }

    pub fn from_bytes(bytes: &[u8], location: &str) -> Result<Self, IdentityError> {
        let document: SignatureDocument =
            from_slice(bytes).map_err(|e| IdentityError::malformed(location, e))?;
        if document.algorithm != SIGNATURE_ALGORITHM {
            return Err(IdentityError::malformed(
                location,
                format!("unsupported signature algorithm `{}`", document.algorithm),
            ));
        }
        Ok(document)
    }
}
