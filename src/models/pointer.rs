// src/models/pointer.rs
//! Content identifiers and ledger pointers.
//!
//! A published package is addressed on the ledger by a single root reference of
//! the shape `{directoryCid}{canonicalPath}{fileName}`, e.g.
//! `QmDir.../akn/eu/doc/2024-01-01/did:key:z.../eng@/main.xml`. Sibling files of
//! the package are reached by swapping the file name.

use crate::error::{IdentityError, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque content identifier returned by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    pub fn new(value: impl Into<String>) -> Self {
        Cid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally addressable reference to a file inside a published package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootRef {
    /// CID of the directory object anchoring the package
    pub directory: Cid,
    /// Canonical package path, always starting and ending with `/`
    pub path: String,
    /// File name within the package
    pub file_name: String,
}

impl RootRef {
    pub fn new(directory: Cid, path: impl Into<String>, file_name: impl Into<String>) -> Self {
        RootRef {
            directory,
            path: path.into(),
            file_name: file_name.into(),
        }
    }

    /// Reference to another file of the same package.
    pub fn sibling(&self, file_name: &str) -> RootRef {
        RootRef::new(self.directory.clone(), self.path.clone(), file_name)
    }

    /// DID segment of a canonical path, `/akn/{jurisdiction}/doc/{date}/{did}/...`.
    pub fn did(&self) -> Option<&str> {
        let mut segments = self.path.strip_prefix("/akn/")?.split('/');
        let _jurisdiction = segments.next()?;
        if segments.next()? != "doc" {
            return None;
        }
        let _date = segments.next()?;
        segments.next().filter(|did| did.starts_with("did:"))
    }

    /// Whether a raw root reference anchors a package of `did`.
    pub fn anchors(raw: &str, did: &str) -> bool {
        raw.parse::<RootRef>()
            .map_or(false, |root| root.did() == Some(did))
    }
}

impl fmt::Display for RootRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.directory, self.path, self.file_name)
    }
}

impl FromStr for RootRef {
    type Err = IdentityError;

    /// Parses `{cid}{path}{file}`. The CID ends at the first `/`; the file name
    /// starts after the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slash = s
            .find('/')
            .ok_or_else(|| IdentityError::malformed(s, "root reference has no path"))?;
        let last = s.rfind('/').unwrap_or(slash);
        let cid = &s[..slash];
        let path = &s[slash..=last];
        let file_name = &s[last + 1..];

        if cid.is_empty() {
            return Err(IdentityError::malformed(s, "root reference has no CID"));
        }
        if file_name.is_empty() {
            return Err(IdentityError::malformed(s, "root reference has no file name"));
        }
        Ok(RootRef::new(Cid::new(cid), path, file_name))
    }
}

impl TryFrom<String> for RootRef {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RootRef> for String {
    fn from(root: RootRef) -> Self {
        root.to_string()
    }
}

/// Ledger token identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase `0x`-prefixed 20-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerAddress(String);

impl OwnerAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OwnerAddress {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| RegistryError::InvalidAddress(s.to_string()))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidAddress(s.to_string()));
        }
        Ok(OwnerAddress(format!("0x{}", hex_part.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for OwnerAddress {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OwnerAddress> for String {
    fn from(value: OwnerAddress) -> Self {
        value.0
    }
}

impl fmt::Display for OwnerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a caller resolves an identity by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Token(TokenId),
    Owner(OwnerAddress),
    /// Latest finalized package of a principal DID
    Did(String),
}

impl FromStr for TokenLookup {
    type Err = RegistryError;

    /// Decimal strings are token ids, `0x` strings are owner addresses and
    /// `did:` strings are principal DIDs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("did:") && s.split(':').count() >= 3 {
            return Ok(TokenLookup::Did(s.to_string()));
        }
        if s.starts_with("0x") || s.starts_with("0X") {
            return s.parse().map(TokenLookup::Owner);
        }
        s.parse::<u64>()
            .map(|id| TokenLookup::Token(TokenId(id)))
            .map_err(|_| RegistryError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for TokenLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenLookup::Token(id) => write!(f, "token {}", id),
            TokenLookup::Owner(address) => write!(f, "owner {}", address),
            TokenLookup::Did(did) => write!(f, "DID {}", did),
        }
    }
}
