// src/package/mod.rs
//! Identity package assembly and resolution.

pub mod assembler;
pub mod resolver;
pub mod session;
pub mod templates;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{AssemblyReceipt, PackageAssembler};
pub use resolver::{AssembledIdentity, PackageResolver};
pub use session::IdentitySession;
pub use templates::ArtifactSet;
