// src/package/testing.rs
//! Fixtures shared by the package tests.

use crate::error::StoreError;
use crate::models::{Cid, DidDocument, Keypair, OwnerAddress};
use crate::storage::{ContentStore, MemoryStore, StoredFile};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;

pub fn keypair() -> Keypair {
    Keypair::from_private_key(&[0x11u8; 32]).unwrap()
}

pub fn owner() -> OwnerAddress {
    "0x00000000000000000000000000000000000000a1".parse().unwrap()
}

/// DID document listing the public key of [`keypair`].
pub fn did_document(did: &str) -> DidDocument {
    did_document_for(did, &keypair())
}

pub fn did_document_for(did: &str, keypair: &Keypair) -> DidDocument {
    DidDocument::from_value(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": did,
        "verificationMethod": [{
            "id": format!("{}#key-1", did),
            "type": "EcdsaSecp256k1VerificationKey2019",
            "controller": did,
            "publicKeyBase58": bs58::encode(&keypair.public_key).into_string()
        }]
    }))
    .unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Push(String, Cid),
    Directory(Cid),
}

/// Memory store that records the order of writes.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    events: Mutex<Vec<StoreEvent>>,
}

impl RecordingStore {
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn push(&self, name: &str, content: Vec<u8>) -> Result<Cid, StoreError> {
        let cid = self.inner.push(name, content).await?;
        self.events
            .lock()
            .unwrap()
            .push(StoreEvent::Push(name.to_string(), cid.clone()));
        Ok(cid)
    }

    async fn compute_cid(&self, content: &[u8]) -> Result<Cid, StoreError> {
        self.inner.compute_cid(content).await
    }

    async fn publish_directory(&self, path: &str, files: &[StoredFile]) -> Result<Cid, StoreError> {
        let cid = self.inner.publish_directory(path, files).await?;
        self.events.lock().unwrap().push(StoreEvent::Directory(cid.clone()));
        Ok(cid)
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.fetch(address).await
    }
}

/// Memory store whose directory writes are always rejected.
pub struct FailingDirectoryStore {
    inner: MemoryStore,
}

pub fn failing_directory_store() -> FailingDirectoryStore {
    FailingDirectoryStore {
        inner: MemoryStore::new(),
    }
}

#[async_trait]
impl ContentStore for FailingDirectoryStore {
    async fn push(&self, name: &str, content: Vec<u8>) -> Result<Cid, StoreError> {
        self.inner.push(name, content).await
    }

    async fn compute_cid(&self, content: &[u8]) -> Result<Cid, StoreError> {
        self.inner.compute_cid(content).await
    }

    async fn publish_directory(&self, path: &str, _files: &[StoredFile]) -> Result<Cid, StoreError> {
        Err(StoreError::Rejected {
            path: path.to_string(),
            reason: "node out of space".into(),
        })
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.fetch(address).await
    }
}
