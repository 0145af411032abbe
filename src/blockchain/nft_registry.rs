// src/blockchain/nft_registry.rs
//! Identity NFT registry client for EVM ledgers.
//!
//! Talks to an ERC-721 (enumerable) contract exposing:
//! - `newIdentity()`: mints an empty token to the sender (reservation)
//! - `finalizeNewIdentity(tokenId, uri)`: sets the token URI once (finalization)
//! - `tokenURI`, `balanceOf`, `tokenOfOwnerByIndex`: resolution
//! - `totalSupply`, `tokenByIndex`: lookup by principal DID, newest token first
//!
//! Signing calls go through a `SignerMiddleware` built from the principal's
//! keypair, so the principal owns the token it mints.

use super::{LedgerConnector, LedgerRegistry, PendingToken};
use crate::config::LedgerSettings;
use crate::error::RegistryError;
use crate::models::{Keypair, OwnerAddress, RootRef, TokenId, TokenLookup};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers_contract::{Contract, ContractError};
use ethers_core::abi::Abi;
use ethers_core::types::{Address, TransactionReceipt, H256, U256, U64};
use ethers_core::utils::keccak256;
use log::{debug, info};
use std::sync::Arc;

const REGISTRY_ABI: &[u8] = include_bytes!("abi/IdentityRegistry.json");
const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Identity registry contract bound to a middleware.
///
/// # Type Parameters
/// * `M` - `SignerClient` for assembly, a plain `Provider<Http>` for
///   read-only resolution
pub struct NftRegistry<M> {
    contract: Contract<M>,
    owner: OwnerAddress,
    gas_limit: U256,
}

fn backend(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Backend(e.to_string())
}

fn format_address(addr: Address) -> String {
    format!("0x{:x}", addr)
}

fn load_contract<M: Middleware>(
    settings: &LedgerSettings,
    client: Arc<M>,
) -> Result<Contract<M>, RegistryError> {
    let abi = Abi::load(REGISTRY_ABI).map_err(backend)?;
    let raw = settings
        .contract_address
        .as_deref()
        .ok_or_else(|| RegistryError::InvalidAddress("ledger.contract_address not set".into()))?;
    let address: Address = raw
        .parse()
        .map_err(|_| RegistryError::InvalidAddress(raw.to_string()))?;
    Ok(Contract::new(address, abi, client))
}

impl NftRegistry<SignerClient> {
    /// Connects with a signer derived from the principal's keypair.
    pub async fn connect(settings: &LedgerSettings, keypair: &Keypair) -> Result<Self, RegistryError> {
        let provider = Provider::<Http>::try_from(settings.rpc_url.as_str()).map_err(backend)?;
        let chain_id = match settings.chain_id {
            Some(id) => id,
            None => provider.get_chainid().await.map_err(backend)?.as_u64(),
        };
        let signing_key = keypair.signing_key().map_err(backend)?;
        let wallet = LocalWallet::from(signing_key).with_chain_id(chain_id);
        let owner: OwnerAddress = format_address(wallet.address()).parse()?;

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = load_contract(settings, client)?;
        debug!("ledger: connected to registry {:?} as {}", contract.address(), owner);
        Ok(NftRegistry {
            contract,
            owner,
            gas_limit: U256::from(settings.gas_limit),
        })
    }
}

impl NftRegistry<Provider<Http>> {
    /// Connects without a signer; only `resolve` is usable.
    pub fn read_only(settings: &LedgerSettings) -> Result<Self, RegistryError> {
        let provider = Provider::<Http>::try_from(settings.rpc_url.as_str()).map_err(backend)?;
        let contract = load_contract(settings, Arc::new(provider))?;
        Ok(NftRegistry {
            contract,
            owner: format_address(Address::zero()).parse()?,
            gas_limit: U256::from(settings.gas_limit),
        })
    }
}

impl<M: Middleware + 'static> NftRegistry<M> {
    async fn token_uri(&self, token: U256) -> Result<Option<String>, RegistryError> {
        match self.contract.method::<_, String>("tokenURI", token).map_err(backend)?.call().await {
            Ok(uri) if uri.is_empty() => Ok(None),
            Ok(uri) => Ok(Some(uri)),
            // Nonexistent tokens revert in ERC-721
            Err(ContractError::Revert(_)) => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    async fn latest_finalized_of(&self, owner: Address) -> Result<Option<String>, RegistryError> {
        let balance: U256 = self
            .contract
            .method::<_, U256>("balanceOf", owner)
            .map_err(backend)?
            .call()
            .await
            .map_err(backend)?;

        let mut index = balance;
        while !index.is_zero() {
            index -= U256::one();
            let token: U256 = self
                .contract
                .method::<_, U256>("tokenOfOwnerByIndex", (owner, index))
                .map_err(backend)?
                .call()
                .await
                .map_err(backend)?;
            if let Some(uri) = self.token_uri(token).await? {
                return Ok(Some(uri));
            }
        }
        Ok(None)
    }

    /// Walks every token newest first until one anchors a package of `did`.
    async fn latest_finalized_for(&self, did: &str) -> Result<Option<String>, RegistryError> {
        let supply: U256 = self
            .contract
            .method::<_, U256>("totalSupply", ())
            .map_err(backend)?
            .call()
            .await
            .map_err(backend)?;
        debug!("ledger: scanning {} tokens for {}", supply, did);

        let mut index = supply;
        while !index.is_zero() {
            index -= U256::one();
            let token: U256 = self
                .contract
                .method::<_, U256>("tokenByIndex", index)
                .map_err(backend)?
                .call()
                .await
                .map_err(backend)?;
            if let Some(uri) = self.token_uri(token).await? {
                if RootRef::anchors(&uri, did) {
                    return Ok(Some(uri));
                }
            }
        }
        Ok(None)
    }

    fn minted_token(&self, receipt: &TransactionReceipt) -> Result<TokenId, RegistryError> {
        let transfer = H256::from(keccak256(TRANSFER_EVENT));
        let token = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.contract.address())
            .find(|log| log.topics.len() == 4 && log.topics[0] == transfer && log.topics[1].is_zero())
            .map(|log| U256::from_big_endian(log.topics[3].as_bytes()))
            .ok_or_else(|| RegistryError::Backend("mint receipt carries no Transfer event".into()))?;
        if token > U256::from(u64::MAX) {
            return Err(RegistryError::Backend(format!("token id {} exceeds u64", token)));
        }
        Ok(TokenId(token.as_u64()))
    }
}

/// Connects one signing registry client per principal.
pub struct EthereumConnector {
    settings: LedgerSettings,
}

impl EthereumConnector {
    pub fn new(settings: LedgerSettings) -> Self {
        EthereumConnector { settings }
    }
}

#[async_trait]
impl LedgerConnector for EthereumConnector {
    async fn connect(&self, keypair: &Keypair) -> Result<Arc<dyn LedgerRegistry>, RegistryError> {
        let registry = NftRegistry::connect(&self.settings, keypair).await?;
        Ok(Arc::new(registry))
    }
}

fn ensure_success(receipt: Option<TransactionReceipt>, what: &str) -> Result<TransactionReceipt, RegistryError> {
    let receipt = receipt.ok_or_else(|| RegistryError::Backend(format!("{} dropped from mempool", what)))?;
    if receipt.status != Some(U64::one()) {
        return Err(RegistryError::Backend(format!(
            "{} reverted in {:?}",
            what, receipt.transaction_hash
        )));
    }
    Ok(receipt)
}

#[async_trait]
impl<M: Middleware + 'static> LedgerRegistry for NftRegistry<M> {
    fn owner(&self) -> &OwnerAddress {
        &self.owner
    }

    async fn reserve(&self) -> Result<PendingToken, RegistryError> {
        let call = self
            .contract
            .method::<_, U256>("newIdentity", ())
            .map_err(backend)?
            .gas(self.gas_limit);
        let pending = call.send().await.map_err(backend)?;
        let receipt = ensure_success(pending.await.map_err(backend)?, "newIdentity")?;
        let token_id = self.minted_token(&receipt)?;
        info!("ledger: reserved token {} for {}", token_id, self.owner);
        Ok(PendingToken {
            token_id,
            owner: self.owner.clone(),
        })
    }

    async fn finalize(&self, token: &PendingToken, root: &RootRef) -> Result<(), RegistryError> {
        let call = self
            .contract
            .method::<_, ()>(
                "finalizeNewIdentity",
                (U256::from(token.token_id.0), root.to_string()),
            )
            .map_err(backend)?
            .gas(self.gas_limit);
        let pending = call.send().await.map_err(backend)?;
        let receipt = ensure_success(pending.await.map_err(backend)?, "finalizeNewIdentity")?;
        info!(
            "ledger: token {} finalized with {} in {:?}",
            token.token_id, root, receipt.transaction_hash
        );
        Ok(())
    }

    async fn resolve(&self, lookup: &TokenLookup) -> Result<Option<String>, RegistryError> {
        match lookup {
            TokenLookup::Token(id) => self.token_uri(U256::from(id.0)).await,
            TokenLookup::Owner(owner) => {
                let address: Address = owner
                    .as_str()
                    .parse()
                    .map_err(|_| RegistryError::InvalidAddress(owner.to_string()))?;
                self.latest_finalized_of(address).await
            }
            TokenLookup::Did(did) => self.latest_finalized_for(did).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_abi_has_registry_methods() {
        let abi = Abi::load(REGISTRY_ABI).unwrap();
        for name in [
            "newIdentity",
            "finalizeNewIdentity",
            "tokenURI",
            "balanceOf",
            "tokenOfOwnerByIndex",
            "totalSupply",
            "tokenByIndex",
        ] {
            assert!(abi.function(name).is_ok(), "missing {}", name);
        }
        let transfer = abi.event("Transfer").unwrap();
        assert_eq!(transfer.signature(), H256::from(keccak256(TRANSFER_EVENT)));
    }

    #[test]
    fn test_read_only_requires_contract_address() {
        let settings = LedgerSettings::default();
        assert!(matches!(
            NftRegistry::read_only(&settings),
            Err(RegistryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_read_only_owner_is_zero_address() {
        let settings = LedgerSettings {
            contract_address: Some("0x00000000000000000000000000000000000000c0".into()),
            ..LedgerSettings::default()
        };
        let registry = NftRegistry::read_only(&settings).unwrap();
        assert_eq!(
            registry.owner().as_str(),
            "0x0000000000000000000000000000000000000000"
        );
    }
}
