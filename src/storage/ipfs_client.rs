// src/storage/ipfs_client.rs
//! IPFS storage client for identity packages.
//!
//! Provides thread-safe interaction with an IPFS node for:
//! - Pushing single payloads and computing their CIDs
//! - Publishing a package directory in one step
//! - Fetching files by CID or by `{cid}{path}`
//!
//! # Directory publishing
//! Files are staged in the node's mutable file system (MFS) under a fresh
//! staging root, the root's hash is read back and pinned, and the staging tree
//! is removed. A failure before the hash is read leaves no CID to anchor.
//!
//! # Security Considerations
//! - All stored data is public by default (IPFS is a public network)
//! - Keypairs are never pushed; only public material and documents are

use super::{ContentStore, StoredFile};
use crate::error::StoreError;
use crate::models::Cid;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use ipfs_api_backend_hyper::request::Add;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use log::{debug, warn};
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use tokio::task;

const STAGING_ROOT: &str = "/iid-staging";

/// Thread-safe IPFS client wrapper.
///
/// The hyper backend's futures are not `Send`, so every call runs on a blocking
/// thread with its own single-threaded runtime.
#[derive(Clone)]
pub struct IpfsStorage {
    /// Shared IPFS client instance (thread-safe via Arc)
    client: Arc<IpfsClient>,
}

impl IpfsStorage {
    /// Connects to the IPFS HTTP API at `api_url`, e.g. `http://127.0.0.1:5001`.
    pub fn new(api_url: &str) -> Result<Self, StoreError> {
        let client = IpfsClient::from_str(api_url)
            .map_err(|e| StoreError::Backend(format!("invalid IPFS API url {}: {}", api_url, e)))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
        })
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<IpfsClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let client = self.client.clone();
        task::spawn_blocking(move || -> Result<T, StoreError> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(op(client))
        })
        .await
        .map_err(|join_err| StoreError::Backend(join_err.to_string()))?
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl ContentStore for IpfsStorage {
    async fn push(&self, name: &str, content: Vec<u8>) -> Result<Cid, StoreError> {
        debug!("ipfs: add {} ({} bytes)", name, content.len());
        self.run(move |client| async move {
            let res = client.add(Cursor::new(content)).await.map_err(backend)?;
            Ok(Cid::new(res.hash))
        })
        .await
    }

    async fn compute_cid(&self, content: &[u8]) -> Result<Cid, StoreError> {
        let data = content.to_vec();
        self.run(move |client| async move {
            let options = Add {
                only_hash: Some(true),
                ..Default::default()
            };
            let res = client
                .add_with_options(Cursor::new(data), options)
                .await
                .map_err(backend)?;
            Ok(Cid::new(res.hash))
        })
        .await
    }

    async fn publish_directory(&self, path: &str, files: &[StoredFile]) -> Result<Cid, StoreError> {
        let staging = format!("{}/{:016x}", STAGING_ROOT, rand::random::<u64>());
        let path = path.to_string();
        let files = files.to_vec();

        self.run(move |client| async move {
            let published = async {
                let dir = format!("{}{}", staging, path.trim_end_matches('/'));
                client.files_mkdir(&dir, true).await.map_err(backend)?;
                for file in files {
                    let target = format!("{}{}{}", staging, path, file.name);
                    client
                        .files_write(&target, true, true, Cursor::new(file.content))
                        .await
                        .map_err(|e| StoreError::Rejected {
                            path: target.clone(),
                            reason: e.to_string(),
                        })?;
                }
                let stat = client.files_stat(&staging).await.map_err(backend)?;
                client.pin_add(&stat.hash, true).await.map_err(backend)?;
                Ok::<_, StoreError>(Cid::new(stat.hash))
            }
            .await;

            if let Err(e) = client.files_rm(&staging, true).await {
                warn!("ipfs: could not remove staging tree {}: {}", staging, e);
            }
            published
        })
        .await
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        let address = address.to_string();
        self.run(move |client| async move {
            let data = client
                .cat(&address)
                .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    Ok(acc)
                })
                .await
                .map_err(|e| StoreError::NotFound(format!("{}: {}", address, e)))?;
            Ok(data.to_vec())
        })
        .await
    }
}
