// src/package/templates.rs
//! Auxiliary artifacts published with every package: the issuer software
//! digest, the NFT contract source and the key-generation script.
//!
//! Copies are embedded in the binary; a configured directory holding files of
//! the same names takes precedence.

use crate::config::PackageConfig;
use crate::error::StoreError;
use crate::models::reference::{
    ReferenceKey, ISSUER_SOFTWARE_FILE, KEYGEN_SCRIPT_FILE, SMART_CONTRACT_FILE,
};
use log::debug;
use std::path::Path;

const EMBEDDED_ISSUER_SOFTWARE: &[u8] =
    include_bytes!("../../templates/IntelligibleIdentity1.0.1.hashdigest.json");
const EMBEDDED_SMART_CONTRACT: &[u8] = include_bytes!("../../templates/IntelligibleIdentity.sol");
const EMBEDDED_KEYGEN_SCRIPT: &[u8] = include_bytes!("../../templates/create-keypair.zen");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    issuer_software: Vec<u8>,
    smart_contract: Vec<u8>,
    keygen_script: Vec<u8>,
}

impl ArtifactSet {
    pub fn embedded() -> Self {
        ArtifactSet {
            issuer_software: EMBEDDED_ISSUER_SOFTWARE.to_vec(),
            smart_contract: EMBEDDED_SMART_CONTRACT.to_vec(),
            keygen_script: EMBEDDED_KEYGEN_SCRIPT.to_vec(),
        }
    }

    /// Reads all three artifacts from `dir`. Every file must exist.
    pub async fn load(dir: &Path) -> Result<Self, StoreError> {
        debug!("templates: loading artifacts from {}", dir.display());
        Ok(ArtifactSet {
            issuer_software: tokio::fs::read(dir.join(ISSUER_SOFTWARE_FILE)).await?,
            smart_contract: tokio::fs::read(dir.join(SMART_CONTRACT_FILE)).await?,
            keygen_script: tokio::fs::read(dir.join(KEYGEN_SCRIPT_FILE)).await?,
        })
    }

    pub async fn from_config(config: &PackageConfig) -> Result<Self, StoreError> {
        match &config.templates_dir {
            Some(dir) => Self::load(dir).await,
            None => Ok(Self::embedded()),
        }
    }

    /// Content of an artifact-backed reference. The DID document is not an
    /// artifact; it comes from the session.
    pub fn content(&self, key: ReferenceKey) -> Option<&[u8]> {
        match key {
            ReferenceKey::IidIssuerSoftware => Some(&self.issuer_software),
            ReferenceKey::NftSmartContract => Some(&self.smart_contract),
            ReferenceKey::ZencodeSoftware => Some(&self.keygen_script),
            _ => None,
        }
    }
}

impl Default for ArtifactSet {
    fn default() -> Self {
        Self::embedded()
    }
}
