// src/error.rs
//! Error types for identity package assembly and resolution.
//!
//! Collaborators (content store, ledger registry, key material) report their own
//! error enums. The assembler and resolver fold them into [`IdentityError`],
//! tagging assembly failures with the [`AssemblyStage`] that failed.

use std::fmt;
use thiserror::Error;

/// The seven ordered steps of package assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    ReserveToken,
    BuildReferences,
    PublishReferences,
    PublishMetadata,
    Sign,
    PublishDirectory,
    FinalizeToken,
}

impl AssemblyStage {
    /// 1-based position of the stage in the assembly pipeline.
    pub fn step(&self) -> u8 {
        match self {
            AssemblyStage::ReserveToken => 1,
            AssemblyStage::BuildReferences => 2,
            AssemblyStage::PublishReferences => 3,
            AssemblyStage::PublishMetadata => 4,
            AssemblyStage::Sign => 5,
            AssemblyStage::PublishDirectory => 6,
            AssemblyStage::FinalizeToken => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssemblyStage::ReserveToken => "reserve-token",
            AssemblyStage::BuildReferences => "build-references",
            AssemblyStage::PublishReferences => "publish-references",
            AssemblyStage::PublishMetadata => "publish-metadata",
            AssemblyStage::Sign => "sign",
            AssemblyStage::PublishDirectory => "publish-directory",
            AssemblyStage::FinalizeToken => "finalize-token",
        }
    }
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (step {})", self.name(), self.step())
    }
}

/// Errors surfaced by package assembly and resolution.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A required input (keypair, ledger session, DID document) was not set.
    #[error("precondition failed: {0} not set")]
    Precondition(&'static str),

    /// A store or registry call failed mid-pipeline.
    #[error("assembly failed at {stage}: {reason}")]
    Assembly {
        stage: AssemblyStage,
        reason: String,
    },

    /// The registry holds no finalized pointer for the lookup.
    #[error("no identity found for {0}")]
    NotFound(String),

    /// Fetched bytes do not deserialize into the expected document.
    #[error("malformed document at {location}: {reason}")]
    MalformedDocument {
        location: String,
        reason: String,
    },

    /// Signature verification against the fetched metadata failed.
    #[error("integrity check failed for {location}: {reason}")]
    Integrity {
        location: String,
        reason: String,
    },

    /// Content store failure outside of assembly.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Registry failure outside of assembly.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Key material could not be produced.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl IdentityError {
    pub fn assembly(stage: AssemblyStage, reason: impl fmt::Display) -> Self {
        IdentityError::Assembly {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        IdentityError::MalformedDocument {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Stage of a failed assembly, if this is an assembly error.
    pub fn stage(&self) -> Option<AssemblyStage> {
        match self {
            IdentityError::Assembly { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Content store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ledger registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown token: {0}")]
    UnknownToken(u64),

    #[error("token {0} is not pending")]
    NotPending(u64),

    #[error("owner {0} already has an assembly in flight")]
    ReservationInFlight(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// Key material failures.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("mnemonic not set")]
    MissingMnemonic,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("key generation service error: {0}")]
    Service(String),
}

pub type Result<T, E = IdentityError> = std::result::Result<T, E>;
