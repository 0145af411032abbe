// src/utils/crypto.rs
//! Hashing helpers.
//!
//! Keccak-256 (Ethereum's standard hash function) is the signing prehash, so
//! package signatures verify the same way on and off chain. SHA-256 backs the
//! CIDv0-shaped identifiers of the in-memory content store.

use ethers::utils::keccak256;
use sha2::{Digest, Sha256};

/// Multihash prefix for a 32-byte SHA2-256 digest.
const SHA2_256_MULTIHASH: [u8; 2] = [0x12, 0x20];

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Base58btc-encoded SHA2-256 multihash of `data`, i.e. a CIDv0 string (`Qm...`).
pub fn content_id(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&SHA2_256_MULTIHASH);
    multihash.extend_from_slice(&digest);
    bs58::encode(multihash).into_string()
}
