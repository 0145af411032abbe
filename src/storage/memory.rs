// src/storage/memory.rs
//! In-process content store.
//!
//! Mirrors the addressing of an IPFS node closely enough for local runs and
//! tests: payload CIDs are CIDv0 strings over the raw bytes, and a published
//! directory exposes its files as `{directoryCid}{path}{name}`.

use super::{ContentStore, StoredFile};
use crate::error::StoreError;
use crate::models::Cid;
use crate::utils::crypto::content_id;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of addressable entries (payloads, directories and directory paths).
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrites the bytes behind an address. Lets tests simulate corruption.
    pub fn tamper(&self, address: &str, content: Vec<u8>) -> Result<(), StoreError> {
        let mut objects = self.write()?;
        match objects.get_mut(address) {
            Some(slot) => {
                *slot = content;
                Ok(())
            }
            None => Err(StoreError::NotFound(address.to_string())),
        }
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.objects
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn directory_listing(path: &str, files: &[StoredFile]) -> Vec<u8> {
        let mut entries: Vec<(String, String)> = files
            .iter()
            .map(|file| (format!("{}{}", path, file.name), content_id(&file.content)))
            .collect();
        entries.sort();
        entries
            .into_iter()
            .flat_map(|(name, cid)| format!("{} {}\n", cid, name).into_bytes())
            .collect()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn push(&self, name: &str, content: Vec<u8>) -> Result<Cid, StoreError> {
        let cid = content_id(&content);
        debug!("memory store: push {} ({} bytes) -> {}", name, content.len(), cid);
        self.write()?.insert(cid.clone(), content);
        Ok(Cid::new(cid))
    }

    async fn compute_cid(&self, content: &[u8]) -> Result<Cid, StoreError> {
        Ok(Cid::new(content_id(content)))
    }

    async fn publish_directory(&self, path: &str, files: &[StoredFile]) -> Result<Cid, StoreError> {
        if !path.starts_with('/') || !path.ends_with('/') {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                reason: "directory path must start and end with '/'".into(),
            });
        }
        if let Some(file) = files
            .iter()
            .find(|file| file.name.is_empty() || file.name.contains('/'))
        {
            return Err(StoreError::Rejected {
                path: format!("{}{}", path, file.name),
                reason: "file names must be non-empty and flat".into(),
            });
        }

        let listing = Self::directory_listing(path, files);
        let directory = content_id(&listing);

        // Everything is validated above; insert under one lock so readers never
        // observe a partial directory.
        let mut objects = self.write()?;
        for file in files {
            objects.insert(content_id(&file.content), file.content.clone());
            objects.insert(format!("{}{}{}", directory, path, file.name), file.content.clone());
        }
        objects.insert(directory.clone(), listing);
        debug!("memory store: published {} files under {}{}", files.len(), directory, path);
        Ok(Cid::new(directory))
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }
}
