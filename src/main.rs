// src/main.rs

//! # Intelligible identity service - Main Entry Point
//!
//! Loads configuration, wires the content store and ledger backends into the
//! package pipelines and starts the API server.
//!
//! ## Configuration
//! - `iid.toml` (or the path given as the first argument), optional
//! - `IID__*` environment variables, e.g. `IID__LEDGER__CONTRACT_ADDRESS`
//! - `.env` is loaded into the environment first
//! - `RUST_LOG` controls log filtering (default `info`)

use anyhow::Context;
use dotenv::dotenv;
use iid_package::blockchain::{EthereumConnector, LedgerConnector, LedgerRegistry, MemoryRegistry, NftRegistry};
use iid_package::config::{LedgerBackend, Settings, StoreBackend};
use iid_package::package::{ArtifactSet, PackageAssembler, PackageResolver};
use iid_package::services::ApiServer;
use iid_package::storage::{ContentStore, IpfsStorage, MemoryStore};
use iid_package::wallet::{ExternalKeygenClient, KeyMaterialProvider, Secp256k1Signer, Signer};
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_file = std::env::args().nth(1);
    let settings = Settings::load(config_file.as_deref()).context("failed to load settings")?;

    let store: Arc<dyn ContentStore> = match settings.ipfs.backend {
        StoreBackend::Ipfs => Arc::new(
            IpfsStorage::new(&settings.ipfs.api_url).context("failed to configure IPFS client")?,
        ),
        StoreBackend::Memory => {
            warn!("using the in-memory content store; packages are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let (connector, registry): (Arc<dyn LedgerConnector>, Arc<dyn LedgerRegistry>) =
        match settings.ledger.backend {
            LedgerBackend::Ethereum => (
                Arc::new(EthereumConnector::new(settings.ledger.clone())),
                Arc::new(
                    NftRegistry::read_only(&settings.ledger)
                        .context("failed to configure identity registry")?,
                ),
            ),
            LedgerBackend::Memory => {
                warn!("using the in-memory ledger; tokens are lost on exit");
                let registry = MemoryRegistry::new(
                    "0x0000000000000000000000000000000000000000".parse()?,
                );
                (Arc::new(registry.clone()), Arc::new(registry))
            }
        };

    let artifacts = ArtifactSet::from_config(&settings.package)
        .await
        .context("failed to load artifact templates")?;
    let signer: Arc<dyn Signer> = Arc::new(Secp256k1Signer);
    let external_keygen = settings
        .keygen
        .service_url
        .as_deref()
        .map(|url| Arc::new(ExternalKeygenClient::new(url)) as Arc<dyn KeyMaterialProvider>);

    let assembler = PackageAssembler::new(
        store.clone(),
        signer.clone(),
        artifacts,
        settings.package.clone(),
    );
    let resolver = PackageResolver::new(store, registry, signer, settings.package.clone());
    let api_server = ApiServer::new(assembler, resolver, connector, external_keygen);

    let addr = settings.server.socket_addr();
    info!("API server running at http://{}", addr);
    info!("Available endpoints:");
    info!("- POST /identities");
    info!("- GET  /identities/token/:id");
    info!("- GET  /identities/address/:address");
    info!("- GET  /identities/did/:did");
    info!("- GET  /health");

    api_server.run(addr).await.context("API server failed")?;
    Ok(())
}
