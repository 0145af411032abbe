// src/lib.rs

//! # Intelligible identity packages
//!
//! Issues and resolves self-describing, signed identity packages. A package is
//! a directory in a content-addressed store (metadata, signature, DID document
//! and auxiliary artifacts) whose root reference is anchored in an NFT owned by
//! the principal.
//!
//! ## Layout
//! 1. **Models**: package documents, references and ledger pointers
//! 2. **Storage**: content store trait, IPFS and in-memory backends
//! 3. **Blockchain**: token registry trait, EVM and in-memory backends
//! 4. **Wallet**: key material, signing and DID documents
//! 5. **Package**: the assembly and resolution pipelines
//! 6. **Services**: HTTP API

pub mod blockchain;
pub mod config;
pub mod error;
pub mod models;
pub mod package;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use error::{AssemblyStage, IdentityError, Result};
pub use package::{AssembledIdentity, IdentitySession, PackageAssembler, PackageResolver};
