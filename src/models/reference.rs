// src/models/reference.rs
//! Identity references: named pointers from the metadata document to the other
//! files of a package.
//!
//! References go through two immutable phases. A [`ReferenceTemplate`] holds the
//! well-known keys with package-relative hrefs. Once the locally available
//! content has been pushed to the store, [`ReferenceTemplate::resolve`] turns it
//! into a [`ResolvedReferenceMap`] in which every published key's href is
//! prefixed with the CID of its content.

use crate::models::metadata::CanonicalPath;
use crate::models::pointer::Cid;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const DID_DOC_FILE: &str = "diddoc.json";
pub const ISSUER_SOFTWARE_FILE: &str = "IntelligibleIdentity1.0.1.hashdigest.json";
pub const SMART_CONTRACT_FILE: &str = "IntelligibleIdentity.sol";
pub const KEYGEN_SCRIPT_FILE: &str = "create-keypair.zen";

const EIDAS_ENTITY: &str = "EU COM/2021/281 final";
const EIDAS_HREF: &str = "/akn/eu/doc/2021-03-06/2021_281/eng@.akn";
const TLC_OBJECT: &str = "TLCObject";

/// Well-known reference keys, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceKey {
    #[serde(rename = "iid")]
    Iid,
    #[serde(rename = "iidDIDDoc")]
    IidDidDoc,
    #[serde(rename = "iidIssuer")]
    IidIssuer,
    #[serde(rename = "eidas")]
    Eidas,
    #[serde(rename = "iidIssuerSoftware")]
    IidIssuerSoftware,
    #[serde(rename = "nftSmartContract")]
    NftSmartContract,
    /// Key-generation script; present iff an external key generator was used.
    #[serde(rename = "zencodeSoftware")]
    ZencodeSoftware,
}

impl ReferenceKey {
    /// Keys every package carries.
    pub const REQUIRED: [ReferenceKey; 6] = [
        ReferenceKey::Iid,
        ReferenceKey::IidDidDoc,
        ReferenceKey::IidIssuer,
        ReferenceKey::Eidas,
        ReferenceKey::IidIssuerSoftware,
        ReferenceKey::NftSmartContract,
    ];

    /// File name under the package path for keys whose content is published
    /// with the package. External references return `None`.
    pub fn local_file(&self) -> Option<&'static str> {
        match self {
            ReferenceKey::IidDidDoc => Some(DID_DOC_FILE),
            ReferenceKey::IidIssuerSoftware => Some(ISSUER_SOFTWARE_FILE),
            ReferenceKey::NftSmartContract => Some(SMART_CONTRACT_FILE),
            ReferenceKey::ZencodeSoftware => Some(KEYGEN_SCRIPT_FILE),
            ReferenceKey::Iid | ReferenceKey::IidIssuer | ReferenceKey::Eidas => None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.local_file().is_some()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReferenceKey::Iid => "iid",
            ReferenceKey::IidDidDoc => "iidDIDDoc",
            ReferenceKey::IidIssuer => "iidIssuer",
            ReferenceKey::Eidas => "eidas",
            ReferenceKey::IidIssuerSoftware => "iidIssuerSoftware",
            ReferenceKey::NftSmartContract => "nftSmartContract",
            ReferenceKey::ZencodeSoftware => "zencodeSoftware",
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub entity: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ReferenceEntry {
    fn new(entity: impl Into<String>, href: impl Into<String>) -> Self {
        ReferenceEntry {
            entity: entity.into(),
            href: href.into(),
            kind: None,
        }
    }

    fn tlc_object(entity: &str, path: &CanonicalPath) -> Self {
        ReferenceEntry {
            entity: entity.to_string(),
            href: format!("{}{}", path, entity),
            kind: Some(TLC_OBJECT.to_string()),
        }
    }

    /// True when the href starts with a CID rather than a bare path.
    pub fn is_cid_qualified(&self) -> bool {
        match self.href.find('/') {
            Some(0) | None => false,
            Some(_) => true,
        }
    }
}

/// Reference map before any content has been published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTemplate {
    entries: BTreeMap<ReferenceKey, ReferenceEntry>,
    used_external_keygen: bool,
}

impl ReferenceTemplate {
    pub fn new(did: &str, path: &CanonicalPath, used_external_keygen: bool) -> Self {
        let package_ref = path.package_ref();
        let mut entries = BTreeMap::new();
        entries.insert(ReferenceKey::Iid, ReferenceEntry::new(did, package_ref.clone()));
        entries.insert(
            ReferenceKey::IidDidDoc,
            ReferenceEntry::new(DID_DOC_FILE, format!("{}{}", path, DID_DOC_FILE)),
        );
        entries.insert(ReferenceKey::IidIssuer, ReferenceEntry::new(did, package_ref));
        entries.insert(ReferenceKey::Eidas, ReferenceEntry::new(EIDAS_ENTITY, EIDAS_HREF));
        entries.insert(
            ReferenceKey::IidIssuerSoftware,
            ReferenceEntry::tlc_object(ISSUER_SOFTWARE_FILE, path),
        );
        entries.insert(
            ReferenceKey::NftSmartContract,
            ReferenceEntry::tlc_object(SMART_CONTRACT_FILE, path),
        );
        if used_external_keygen {
            entries.insert(
                ReferenceKey::ZencodeSoftware,
                ReferenceEntry::tlc_object(KEYGEN_SCRIPT_FILE, path),
            );
        }
        ReferenceTemplate {
            entries,
            used_external_keygen,
        }
    }

    /// Keys whose content must be pushed before the map can be resolved.
    pub fn published_keys(&self) -> Vec<ReferenceKey> {
        self.entries.keys().copied().filter(ReferenceKey::is_published).collect()
    }

    pub fn get(&self, key: ReferenceKey) -> Option<&ReferenceEntry> {
        self.entries.get(&key)
    }

    pub fn used_external_keygen(&self) -> bool {
        self.used_external_keygen
    }

    /// Rewrites each published key's href to `{cid}{href}`.
    ///
    /// Fails with the offending key when a published key has no CID, or when a
    /// CID is supplied for a key the template does not publish.
    pub fn resolve(
        self,
        cids: &HashMap<ReferenceKey, Cid>,
    ) -> Result<ResolvedReferenceMap, ReferenceKey> {
        if let Some(stray) = cids
            .keys()
            .find(|key| !self.entries.contains_key(*key) || !key.is_published())
        {
            return Err(*stray);
        }

        let mut entries = BTreeMap::new();
        for (key, mut entry) in self.entries {
            if key.is_published() {
                let cid = cids.get(&key).ok_or(key)?;
                entry.href = format!("{}{}", cid, entry.href);
            }
            entries.insert(key, entry);
        }
        Ok(ResolvedReferenceMap {
            entries,
            used_external_keygen: self.used_external_keygen,
        })
    }
}

/// Reference map whose published keys are all CID-qualified.
///
/// Serializes as a plain key → entry map; the keygen flag is recovered from
/// key membership when a map is read back and carried explicitly afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<ReferenceKey, ReferenceEntry>",
    into = "BTreeMap<ReferenceKey, ReferenceEntry>"
)]
pub struct ResolvedReferenceMap {
    entries: BTreeMap<ReferenceKey, ReferenceEntry>,
    used_external_keygen: bool,
}

impl ResolvedReferenceMap {
    pub fn get(&self, key: ReferenceKey) -> Option<&ReferenceEntry> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: ReferenceKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ReferenceKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReferenceKey, &ReferenceEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_external_keygen(&self) -> bool {
        self.used_external_keygen
    }

    /// CID prefix of a published key's href.
    pub fn cid_of(&self, key: ReferenceKey) -> Option<Cid> {
        let entry = self.entries.get(&key)?;
        if !key.is_published() || !entry.is_cid_qualified() {
            return None;
        }
        entry.href.split('/').next().map(Cid::new)
    }
}

impl TryFrom<BTreeMap<ReferenceKey, ReferenceEntry>> for ResolvedReferenceMap {
    type Error = String;

    fn try_from(entries: BTreeMap<ReferenceKey, ReferenceEntry>) -> Result<Self, Self::Error> {
        if let Some(missing) = ReferenceKey::REQUIRED.iter().find(|key| !entries.contains_key(*key)) {
            return Err(format!("missing reference `{}`", missing));
        }
        if let Some((key, entry)) = entries
            .iter()
            .find(|(key, entry)| key.is_published() && !entry.is_cid_qualified())
        {
            return Err(format!("reference `{}` is unresolved: {}", key, entry.href));
        }
        let used_external_keygen = entries.contains_key(&ReferenceKey::ZencodeSoftware);
        Ok(ResolvedReferenceMap {
            entries,
            used_external_keygen,
        })
    }
}

impl From<ResolvedReferenceMap> for BTreeMap<ReferenceKey, ReferenceEntry> {
    fn from(map: ResolvedReferenceMap) -> Self {
        map.entries
    }
}
