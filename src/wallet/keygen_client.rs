// src/wallet/keygen_client.rs
//! HTTP client for an external key-generation service.
//!
//! The service answers `GET {base}/keypair` with a Zenroom-style body:
//! ```json
//! { "keypair": { "public_key": "<base64>", "private_key": "<base64>" } }
//! ```

use super::key_management::KeyMaterialProvider;
use crate::error::KeyError;
use crate::models::Keypair;
use async_trait::async_trait;
use log::info;
use serde::Deserialize;

#[derive(Deserialize)]
struct KeygenResponse {
    keypair: EncodedKeypair,
}

#[derive(Deserialize)]
struct EncodedKeypair {
    public_key: String,
    private_key: String,
}

pub struct ExternalKeygenClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExternalKeygenClient {
    pub fn new(base_url: &str) -> Self {
        ExternalKeygenClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, KeyError> {
    base64::decode(value).map_err(|e| KeyError::Service(format!("{} is not base64: {}", field, e)))
}

#[async_trait]
impl KeyMaterialProvider for ExternalKeygenClient {
    async fn provide(&self) -> Result<Keypair, KeyError> {
        let url = format!("{}/keypair", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| KeyError::Service(e.to_string()))?
            .error_for_status()
            .map_err(|e| KeyError::Service(e.to_string()))?;
        let body: KeygenResponse = response
            .json()
            .await
            .map_err(|e| KeyError::Service(format!("unexpected response: {}", e)))?;

        let given = Keypair {
            public_key: decode("public_key", &body.keypair.public_key)?,
            private_key: decode("private_key", &body.keypair.private_key)?,
        };
        // Accepts compressed or uncompressed public keys, stores compressed
        given.validate()?;
        info!("wallet: keypair received from {}", url);
        Keypair::from_private_key(&given.private_key)
    }

    fn is_external(&self) -> bool {
        true
    }
}
