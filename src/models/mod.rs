// src/models/mod.rs
//! Data model of an identity package.

pub mod did;
pub mod keypair;
pub mod metadata;
pub mod pointer;
pub mod reference;
pub mod signature;

pub use did::DidDocument;
pub use keypair::Keypair;
pub use metadata::{CanonicalPath, IdentityInformation, MetadataDocument, METADATA_FILE};
pub use pointer::{Cid, OwnerAddress, RootRef, TokenId, TokenLookup};
pub use reference::{
    ReferenceEntry, ReferenceKey, ReferenceTemplate, ResolvedReferenceMap, DID_DOC_FILE,
};
pub use signature::{SignatureDocument, SIGNATURE_FILE};
