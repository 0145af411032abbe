// src/wallet/mod.rs
//! Principal key material, signing and DID documents.

pub mod did_builder;
pub mod key_management;
pub mod keygen_client;

pub use did_builder::{DidDocumentBuilder, KeyDidBuilder};
pub use key_management::{
    KeyMaterialProvider, MnemonicKeyProvider, RandomKeyProvider, Secp256k1Signer, Signer,
};
pub use keygen_client::ExternalKeygenClient;
