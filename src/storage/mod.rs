// src/storage/mod.rs
//! Content-addressed storage for package files.

pub mod ipfs_client;
pub mod memory;

use crate::error::StoreError;
use crate::models::Cid;
use async_trait::async_trait;

pub use ipfs_client::IpfsStorage;
pub use memory::MemoryStore;

/// A named payload destined for a package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl StoredFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        StoredFile {
            name: name.into(),
            content,
        }
    }
}

/// Content-addressed object store.
///
/// CIDs are deterministic functions of content. Addresses accepted by
/// [`ContentStore::fetch`] are either a bare CID or `{cid}{path}` pointing into
/// a published directory.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores one payload and returns its CID.
    async fn push(&self, name: &str, content: Vec<u8>) -> Result<Cid, StoreError>;

    /// CID the payload gets when pushed, without storing it.
    async fn compute_cid(&self, content: &[u8]) -> Result<Cid, StoreError>;

    /// Writes `files` under `path` as one directory and returns the directory CID.
    ///
    /// Either every file becomes reachable under the returned CID or the call
    /// fails; a failed call leaves no directory CID for callers to anchor.
    async fn publish_directory(&self, path: &str, files: &[StoredFile]) -> Result<Cid, StoreError>;

    async fn fetch(&self, address: &str) -> Result<Vec<u8>, StoreError>;
}
