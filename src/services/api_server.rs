// src/services/api_server.rs
//! HTTP API for issuing and resolving identity packages.
//!
//! Endpoints:
//! - `POST /identities`: obtain a keypair, build its `did:key` document and
//!   assemble, publish and anchor the package
//! - `GET /identities/token/:id`: resolve the package anchored in a token
//! - `GET /identities/address/:address`: resolve an owner's latest package
//! - `GET /identities/did/:did`: resolve a principal DID's latest package
//! - `GET /health`: liveness probe

use crate::blockchain::LedgerConnector;
use crate::error::{IdentityError, KeyError, RegistryError};
use crate::models::{OwnerAddress, TokenId, TokenLookup};
use crate::package::{AssembledIdentity, IdentitySession, PackageAssembler, PackageResolver};
use crate::wallet::{
    DidDocumentBuilder, KeyDidBuilder, KeyMaterialProvider, MnemonicKeyProvider, RandomKeyProvider,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Where the principal's keypair comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KeySource {
    #[default]
    Mnemonic,
    External,
    Random,
}

/// Request payload for issuing a new identity package
#[derive(Debug, Deserialize)]
struct CreateIdentityRequest {
    #[serde(default)]
    keygen: KeySource,
    mnemonic: Option<String>,
    index: Option<u32>,
    /// Defaults to today's date
    issuing_date: Option<NaiveDate>,
}

/// Response for a successful issuance
#[derive(Debug, Serialize, Deserialize)]
struct CreateIdentityResponse {
    token_id: TokenId,
    root: String,
    did: String,
    owner: OwnerAddress,
    metadata_cid: String,
    signature_cid: String,
}

/// Error body with the HTTP status derived from the error kind.
struct ApiError(IdentityError);

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IdentityError::Precondition(_)
            | IdentityError::Key(_)
            | IdentityError::Registry(RegistryError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
            IdentityError::MalformedDocument { .. } | IdentityError::Integrity { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IdentityError::Store(_) | IdentityError::Registry(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Assembly { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("api: {}", self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "stage": self.0.stage().map(|stage| stage.step()),
        });
        (status, Json(body)).into_response()
    }
}

pub struct ApiServer {
    assembler: PackageAssembler,
    resolver: PackageResolver,
    connector: Arc<dyn LedgerConnector>,
    external_keygen: Option<Arc<dyn KeyMaterialProvider>>,
    did_builder: KeyDidBuilder,
}

impl ApiServer {
    pub fn new(
        assembler: PackageAssembler,
        resolver: PackageResolver,
        connector: Arc<dyn LedgerConnector>,
        external_keygen: Option<Arc<dyn KeyMaterialProvider>>,
    ) -> Self {
        ApiServer {
            assembler,
            resolver,
            connector,
            external_keygen,
            did_builder: KeyDidBuilder,
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/identities", post(Self::create_identity_handler))
            .route("/identities/token/:id", get(Self::resolve_token_handler))
            .route("/identities/address/:address", get(Self::resolve_address_handler))
            .route("/identities/did/:did", get(Self::resolve_did_handler))
            .route("/health", get(Self::health_handler))
            .with_state(Arc::new(self))
    }

    pub async fn run(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("api: listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    /// Issues a new identity package.
    ///
    /// # Endpoint
    /// POST /identities
    ///
    /// # Responses
    /// - 200 OK: token id and root reference
    /// - 400 Bad Request: key material could not be obtained
    /// - 500 Internal Server Error: assembly failed; the body names the stage
    async fn create_identity_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateIdentityRequest>,
    ) -> Result<Json<CreateIdentityResponse>, ApiError> {
        let mut session = IdentitySession::new();
        match payload.keygen {
            KeySource::Mnemonic => {
                let provider = MnemonicKeyProvider::new(payload.mnemonic, payload.index);
                session.create_keypair(&provider).await?
            }
            KeySource::External => {
                let provider = state.external_keygen.as_ref().ok_or_else(|| {
                    IdentityError::Key(KeyError::Service("no key generation service configured".into()))
                })?;
                session.create_keypair(provider.as_ref()).await?
            }
            KeySource::Random => session.create_keypair(&RandomKeyProvider).await?,
        }
        if let Some(date) = payload.issuing_date {
            session.set_issuing_date(date);
        }
        session.create_did_document(&state.did_builder as &dyn DidDocumentBuilder)?;

        let ledger = state
            .connector
            .connect(session.keypair()?)
            .await
            .map_err(IdentityError::from)?;
        let owner = ledger.owner().clone();
        session.set_ledger(ledger);

        let receipt = state.assembler.assemble(&session).await?;
        Ok(Json(CreateIdentityResponse {
            token_id: receipt.token_id,
            root: receipt.root.to_string(),
            did: session.did_document()?.id().to_string(),
            owner,
            metadata_cid: receipt.metadata_cid.to_string(),
            signature_cid: receipt.signature_cid.to_string(),
        }))
    }

    async fn resolve_token_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<u64>,
    ) -> Result<Json<AssembledIdentity>, ApiError> {
        let identity = state
            .resolver
            .resolve_from_token(&TokenLookup::Token(TokenId(id)))
            .await?;
        Ok(Json(identity))
    }

    async fn resolve_address_handler(
        State(state): State<Arc<ApiServer>>,
        Path(address): Path<String>,
    ) -> Result<Json<AssembledIdentity>, ApiError> {
        let owner: OwnerAddress = address.parse().map_err(IdentityError::from)?;
        let identity = state.resolver.resolve_from_address(&owner).await?;
        Ok(Json(identity))
    }

    async fn resolve_did_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> Result<Json<AssembledIdentity>, ApiError> {
        let identity = state.resolver.resolve_from_did(&did).await?;
        Ok(Json(identity))
    }

    async fn health_handler() -> impl IntoResponse {
        Json(json!({ "status": "ok" }))
    }
}
