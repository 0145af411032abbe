// src/models/keypair.rs
//! Principal key material.

use crate::error::KeyError;
use crate::models::pointer::OwnerAddress;
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::fmt;

/// secp256k1 keypair owned by one identity session.
///
/// The public key is kept in SEC1 compressed form (33 bytes), the private key
/// as the raw 32-byte scalar. Keypairs are never written to the content store.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl Keypair {
    /// Builds a keypair from a private scalar, deriving the compressed public key.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(&signing_key))
    }

    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        Keypair {
            public_key,
            private_key: signing_key.to_bytes().to_vec(),
        }
    }

    /// Checks that the public key belongs to the private key.
    pub fn validate(&self) -> Result<(), KeyError> {
        let derived = Keypair::from_private_key(&self.private_key)?;
        let given = VerifyingKey::from_sec1_bytes(&self.public_key)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        if derived.public_key != given.to_encoded_point(true).as_bytes() {
            return Err(KeyError::InvalidKey(
                "public key does not match private key".into(),
            ));
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<SigningKey, KeyError> {
        SigningKey::from_slice(&self.private_key).map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    /// Ledger account controlled by this keypair.
    pub fn address(&self) -> Result<OwnerAddress, KeyError> {
        let address = ethers::utils::secret_key_to_address(&self.signing_key()?);
        format!("0x{:x}", address)
            .parse()
            .map_err(|e: crate::error::RegistryError| KeyError::InvalidKey(e.to_string()))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &ethers::utils::hex::encode(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}
