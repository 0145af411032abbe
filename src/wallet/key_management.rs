// src/wallet/key_management.rs
//! Key material for identity sessions.
//!
//! Provides:
//! - Keypairs derived from a BIP-39 mnemonic at an account index
//! - Freshly generated random keypairs
//! - ECDSA (secp256k1) signing and verification with Keccak-256 prehashing
//!
//! Externally generated keypairs come from [`crate::wallet::keygen_client`].

use crate::error::KeyError;
use crate::models::Keypair;
use crate::utils::crypto::hash_data;
use async_trait::async_trait;
use ethers::signers::{coins_bip39::English, MnemonicBuilder};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use log::debug;

/// Source of a principal's keypair.
#[async_trait]
pub trait KeyMaterialProvider: Send + Sync {
    async fn provide(&self) -> Result<Keypair, KeyError>;

    /// True when keys come from the external key-generation service. Packages
    /// built from such keys reference the key-generation script.
    fn is_external(&self) -> bool {
        false
    }
}

/// Derives keys along the Ethereum BIP-44 path `m/44'/60'/0'/0/{index}`.
pub struct MnemonicKeyProvider {
    phrase: Option<String>,
    index: u32,
}

impl MnemonicKeyProvider {
    /// # Arguments
    /// * `phrase` - BIP-39 mnemonic; `None` fails with [`KeyError::MissingMnemonic`]
    /// * `index` - account index, 0 when unset
    pub fn new(phrase: Option<String>, index: Option<u32>) -> Self {
        MnemonicKeyProvider {
            phrase,
            index: index.unwrap_or(0),
        }
    }
}

#[async_trait]
impl KeyMaterialProvider for MnemonicKeyProvider {
    async fn provide(&self) -> Result<Keypair, KeyError> {
        let phrase = self.phrase.as_deref().ok_or(KeyError::MissingMnemonic)?;
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(self.index)
            .map_err(|e| KeyError::Derivation(e.to_string()))?
            .build()
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        debug!("wallet: derived key at index {}", self.index);
        Ok(Keypair::from_signing_key(wallet.signer()))
    }
}

/// Generates a new keypair from the system RNG on every call.
#[derive(Default)]
pub struct RandomKeyProvider;

#[async_trait]
impl KeyMaterialProvider for RandomKeyProvider {
    async fn provide(&self) -> Result<Keypair, KeyError> {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Ok(Keypair::from_signing_key(&signing_key))
    }
}

/// Signs and verifies package payloads.
pub trait Signer: Send + Sync {
    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Result<Vec<u8>, KeyError>;

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, KeyError>;
}

/// ECDSA over secp256k1 with a Keccak-256 prehash (Ethereum style).
///
/// Signatures are 64-byte compact `r || s`, deterministic per RFC 6979.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Signer;

impl Signer for Secp256k1Signer {
    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let hash = hash_data(message);
        let signature: Signature = keypair
            .signing_key()?
            .sign_prehash(&hash)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let signature =
            Signature::from_slice(signature).map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(verifying_key.verify_prehash(&hash_data(message), &signature).is_ok())
    }
}
