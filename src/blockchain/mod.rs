// src/blockchain/mod.rs
//! Ledger registry: NFT slots anchoring package root references.

pub mod memory;
pub mod nft_registry;

use crate::error::RegistryError;
use crate::models::{Keypair, OwnerAddress, RootRef, TokenId, TokenLookup};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

pub use memory::MemoryRegistry;
pub use nft_registry::{EthereumConnector, NftRegistry};

/// A token slot reserved for one assembly attempt, not yet finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToken {
    pub token_id: TokenId,
    pub owner: OwnerAddress,
}

/// Registry of identity tokens.
///
/// The core only ever reserves and finalizes; every other ledger mutation is
/// outside its responsibility.
#[async_trait]
pub trait LedgerRegistry: Send + Sync {
    /// Address the registry acts for.
    fn owner(&self) -> &OwnerAddress;

    /// Mints a token for the owner with no root reference yet.
    async fn reserve(&self) -> Result<PendingToken, RegistryError>;

    /// Anchors `root` in a reserved token.
    async fn finalize(&self, token: &PendingToken, root: &RootRef) -> Result<(), RegistryError>;

    /// Root reference of a token, or of the owner's most recently finalized
    /// token. `None` when nothing finalized matches.
    async fn resolve(&self, lookup: &TokenLookup) -> Result<Option<String>, RegistryError>;

    /// Marks a reservation as orphaned. No ledger transaction is sent.
    fn abandon(&self, token: &PendingToken) {
        warn!(
            "token {} of {} abandoned without a root reference",
            token.token_id, token.owner
        );
    }
}

/// Opens a registry session acting for the account of a keypair.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self, keypair: &Keypair) -> Result<Arc<dyn LedgerRegistry>, RegistryError>;
}

/// Scoped reservation: either committed through [`Reservation::finalize`] or
/// abandoned when dropped, on every exit path of an assembly.
pub struct Reservation {
    registry: Arc<dyn LedgerRegistry>,
    token: Option<PendingToken>,
}

impl Reservation {
    pub async fn acquire(registry: Arc<dyn LedgerRegistry>) -> Result<Self, RegistryError> {
        let token = registry.reserve().await?;
        Ok(Reservation {
            registry,
            token: Some(token),
        })
    }

    pub fn token_id(&self) -> Option<TokenId> {
        self.token.as_ref().map(|token| token.token_id)
    }

    /// Finalizes the token with `root`. On failure the reservation is abandoned.
    pub async fn finalize(mut self, root: &RootRef) -> Result<TokenId, RegistryError> {
        let token = match self.token.take() {
            Some(token) => token,
            None => return Err(RegistryError::Backend("reservation already consumed".into())),
        };
        match self.registry.finalize(&token, root).await {
            Ok(()) => Ok(token.token_id),
            Err(e) => {
                self.registry.abandon(&token);
                Err(e)
            }
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.registry.abandon(&token);
        }
    }
}
