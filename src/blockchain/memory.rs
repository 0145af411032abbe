// src/blockchain/memory.rs
//! In-process token registry with the same reserve/finalize semantics as the
//! on-chain contract. Handles created with [`MemoryRegistry::for_owner`] share
//! one ledger.

use super::{LedgerConnector, LedgerRegistry, PendingToken};
use crate::error::RegistryError;
use crate::models::{Keypair, OwnerAddress, RootRef, TokenId, TokenLookup};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Pending,
    Finalized,
    Abandoned,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    owner: OwnerAddress,
    root: Option<String>,
    status: TokenStatus,
}

#[derive(Debug, Default)]
struct Ledger {
    tokens: BTreeMap<u64, TokenRecord>,
}

#[derive(Clone)]
pub struct MemoryRegistry {
    ledger: Arc<Mutex<Ledger>>,
    owner: OwnerAddress,
}

impl MemoryRegistry {
    pub fn new(owner: OwnerAddress) -> Self {
        MemoryRegistry {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            owner,
        }
    }

    /// Handle acting for another owner on the same ledger.
    pub fn for_owner(&self, owner: OwnerAddress) -> Self {
        MemoryRegistry {
            ledger: self.ledger.clone(),
            owner,
        }
    }

    pub fn status(&self, token_id: TokenId) -> Option<TokenStatus> {
        self.lock()
            .ok()?
            .tokens
            .get(&token_id.0)
            .map(|record| record.status)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, RegistryError> {
        self.ledger
            .lock()
            .map_err(|_| RegistryError::Backend("ledger lock poisoned".into()))
    }
}

#[async_trait]
impl LedgerRegistry for MemoryRegistry {
    fn owner(&self) -> &OwnerAddress {
        &self.owner
    }

    async fn reserve(&self) -> Result<PendingToken, RegistryError> {
        let mut ledger = self.lock()?;
        let in_flight = ledger
            .tokens
            .values()
            .any(|record| record.owner == self.owner && record.status == TokenStatus::Pending);
        if in_flight {
            return Err(RegistryError::ReservationInFlight(self.owner.to_string()));
        }

        let token_id = ledger.tokens.keys().next_back().map_or(1, |last| last + 1);
        ledger.tokens.insert(
            token_id,
            TokenRecord {
                owner: self.owner.clone(),
                root: None,
                status: TokenStatus::Pending,
            },
        );
        debug!("ledger: reserved token {} for {}", token_id, self.owner);
        Ok(PendingToken {
            token_id: TokenId(token_id),
            owner: self.owner.clone(),
        })
    }

    async fn finalize(&self, token: &PendingToken, root: &RootRef) -> Result<(), RegistryError> {
        let mut ledger = self.lock()?;
        let record = ledger
            .tokens
            .get_mut(&token.token_id.0)
            .ok_or(RegistryError::UnknownToken(token.token_id.0))?;
        if record.status != TokenStatus::Pending || record.owner != token.owner {
            return Err(RegistryError::NotPending(token.token_id.0));
        }
        record.root = Some(root.to_string());
        record.status = TokenStatus::Finalized;
        info!("ledger: token {} finalized with {}", token.token_id, root);
        Ok(())
    }

    async fn resolve(&self, lookup: &TokenLookup) -> Result<Option<String>, RegistryError> {
        let ledger = self.lock()?;
        let root = match lookup {
            TokenLookup::Token(id) => ledger
                .tokens
                .get(&id.0)
                .filter(|record| record.status == TokenStatus::Finalized)
                .and_then(|record| record.root.clone()),
            TokenLookup::Owner(owner) => ledger
                .tokens
                .values()
                .rev()
                .find(|record| &record.owner == owner && record.status == TokenStatus::Finalized)
                .and_then(|record| record.root.clone()),
            TokenLookup::Did(did) => ledger
                .tokens
                .values()
                .rev()
                .filter(|record| record.status == TokenStatus::Finalized)
                .filter_map(|record| record.root.as_deref())
                .find(|root| RootRef::anchors(root, did))
                .map(str::to_string),
        };
        Ok(root)
    }

    fn abandon(&self, token: &PendingToken) {
        match self.ledger.lock() {
            Ok(mut ledger) => {
                if let Some(record) = ledger.tokens.get_mut(&token.token_id.0) {
                    if record.status == TokenStatus::Pending {
                        record.status = TokenStatus::Abandoned;
                        warn!("ledger: token {} of {} abandoned", token.token_id, token.owner);
                    }
                }
            }
            Err(_) => warn!("ledger: lock poisoned while abandoning token {}", token.token_id),
        }
    }
}

#[async_trait]
impl LedgerConnector for MemoryRegistry {
    async fn connect(&self, keypair: &Keypair) -> Result<Arc<dyn LedgerRegistry>, RegistryError> {
        let owner = keypair
            .address()
            .map_err(|e| RegistryError::InvalidAddress(e.to_string()))?;
        Ok(Arc::new(self.for_owner(owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Reservation;
    use crate::models::Cid;

    fn alice() -> OwnerAddress {
        "0x00000000000000000000000000000000000000a1".parse().unwrap()
    }

    fn bob() -> OwnerAddress {
        "0x00000000000000000000000000000000000000b0".parse().unwrap()
    }

    fn root(tag: &str) -> RootRef {
        root_of(tag, "did:example:1")
    }

    fn root_of(tag: &str, did: &str) -> RootRef {
        RootRef::new(Cid::new(tag), format!("/akn/eu/doc/2024-01-01/{}/eng@/", did), "main.xml")
    }

    #[tokio::test]
    async fn test_reserve_then_finalize() {
        let registry = MemoryRegistry::new(alice());
        let token = registry.reserve().await.unwrap();
        assert_eq!(registry.status(token.token_id), Some(TokenStatus::Pending));
        assert_eq!(registry.resolve(&TokenLookup::Token(token.token_id)).await.unwrap(), None);

        registry.finalize(&token, &root("QmA")).await.unwrap();
        assert_eq!(
            registry.resolve(&TokenLookup::Token(token.token_id)).await.unwrap(),
            Some(root("QmA").to_string())
        );
        assert!(matches!(
            registry.finalize(&token, &root("QmB")).await,
            Err(RegistryError::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn test_one_reservation_in_flight_per_owner() {
        let registry = MemoryRegistry::new(alice());
        let _first = registry.reserve().await.unwrap();
        assert!(matches!(
            registry.reserve().await,
            Err(RegistryError::ReservationInFlight(_))
        ));
        assert!(registry.for_owner(bob()).reserve().await.is_ok());
    }

    #[tokio::test]
    async fn test_owner_lookup_returns_latest_finalized() {
        let registry = MemoryRegistry::new(alice());
        let first = registry.reserve().await.unwrap();
        registry.finalize(&first, &root("QmOld")).await.unwrap();
        let second = registry.reserve().await.unwrap();
        registry.finalize(&second, &root("QmNew")).await.unwrap();
        let third = registry.reserve().await.unwrap();
        registry.abandon(&third);

        assert_eq!(
            registry.resolve(&TokenLookup::Owner(alice())).await.unwrap(),
            Some(root("QmNew").to_string())
        );
        assert_eq!(registry.resolve(&TokenLookup::Owner(bob())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_did_lookup_returns_latest_finalized_package() {
        let registry = MemoryRegistry::new(alice());
        let first = registry.reserve().await.unwrap();
        registry.finalize(&first, &root_of("QmOld", "did:example:1")).await.unwrap();
        let second = registry.reserve().await.unwrap();
        registry.finalize(&second, &root_of("QmNew", "did:example:1")).await.unwrap();

        // another principal's newer package under a different owner
        let bob_registry = registry.for_owner(bob());
        let third = bob_registry.reserve().await.unwrap();
        bob_registry.finalize(&third, &root_of("QmBob", "did:example:2")).await.unwrap();
        let pending = registry.reserve().await.unwrap();
        assert_eq!(registry.status(pending.token_id), Some(TokenStatus::Pending));

        let lookup = TokenLookup::Did("did:example:1".into());
        assert_eq!(
            registry.resolve(&lookup).await.unwrap(),
            Some(root_of("QmNew", "did:example:1").to_string())
        );
        assert_eq!(
            registry.resolve(&TokenLookup::Did("did:example:2".into())).await.unwrap(),
            Some(root_of("QmBob", "did:example:2").to_string())
        );
        assert_eq!(
            registry.resolve(&TokenLookup::Did("did:example:404".into())).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_dropped_reservation_is_abandoned() {
        let registry = MemoryRegistry::new(alice());
        let shared: Arc<dyn LedgerRegistry> = Arc::new(registry.clone());
        let reservation = Reservation::acquire(shared.clone()).await.unwrap();
        let token_id = reservation.token_id().unwrap();
        drop(reservation);
        assert_eq!(registry.status(token_id), Some(TokenStatus::Abandoned));

        let reservation = Reservation::acquire(shared).await.unwrap();
        let token_id = reservation.token_id().unwrap();
        assert_eq!(reservation.finalize(&root("QmOk")).await.unwrap(), token_id);
        assert_eq!(registry.status(token_id), Some(TokenStatus::Finalized));
    }

    #[tokio::test]
    async fn test_connector_acts_for_keypair_account() {
        let registry = MemoryRegistry::new(alice());
        let keypair = Keypair::from_private_key(&[9u8; 32]).unwrap();
        let session = registry.connect(&keypair).await.unwrap();
        assert_eq!(session.owner(), &keypair.address().unwrap());

        let token = session.reserve().await.unwrap();
        session.finalize(&token, &root("QmShared")).await.unwrap();
        // same ledger, visible through the original handle
        assert_eq!(registry.status(token.token_id), Some(TokenStatus::Finalized));
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let registry = MemoryRegistry::new(alice());
        assert_eq!(registry.resolve(&TokenLookup::Token(TokenId(99))).await.unwrap(), None);
    }
}
