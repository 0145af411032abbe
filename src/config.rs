// src/config.rs
//! Runtime configuration.
//!
//! Sources are layered with the `config` crate, later ones winning:
//! 1. built-in defaults (the `Default` impls below)
//! 2. an optional TOML file (`iid.toml` unless another path is given)
//! 3. environment variables prefixed `IID__`, with `__` between nesting levels,
//!    e.g. `IID__LEDGER__RPC_URL` or `IID__PACKAGE__JURISDICTION`
//!
//! A `.env` file is loaded into the environment by the binary before this runs.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "iid.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub package: PackageConfig,
    pub ipfs: IpfsSettings,
    pub ledger: LedgerSettings,
    pub keygen: KeygenSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Loads settings from defaults, `file` (or `iid.toml`) and the environment.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file.unwrap_or(DEFAULT_CONFIG_FILE)).required(file.is_some()))
            .add_source(
                Environment::with_prefix("IID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Parameters of package assembly and resolution, passed explicitly to the
/// assembler and resolver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Jurisdiction segment of the canonical path (`/akn/{jurisdiction}/...`)
    pub jurisdiction: String,
    /// Directory holding the artifact templates; embedded copies when unset
    pub templates_dir: Option<PathBuf>,
    /// Verify the package signature while resolving
    pub verify_signatures: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            jurisdiction: "eu".to_string(),
            templates_dir: None,
            verify_signatures: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Ipfs,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpfsSettings {
    pub backend: StoreBackend,
    pub api_url: String,
}

impl Default for IpfsSettings {
    fn default() -> Self {
        IpfsSettings {
            backend: StoreBackend::Ipfs,
            api_url: "http://127.0.0.1:5001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Ethereum,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub backend: LedgerBackend,
    pub rpc_url: String,
    /// Address of the deployed identity NFT contract
    pub contract_address: Option<String>,
    /// Queried from the node when unset
    pub chain_id: Option<u64>,
    pub gas_limit: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            backend: LedgerBackend::Ethereum,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: None,
            chain_id: None,
            gas_limit: 3_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeygenSettings {
    /// Base URL of the external key-generation service
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
        }
    }
}
