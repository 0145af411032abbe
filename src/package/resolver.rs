// src/package/resolver.rs
//! Package resolution: ledger pointer in, in-memory identity out.
//!
//! Resolution is read-only. It looks up the root reference on the ledger,
//! fetches the metadata, signature and DID documents of the package and, when
//! enabled, checks that the signature covers exactly the fetched metadata and
//! was made with a key the DID document lists.

use crate::blockchain::LedgerRegistry;
use crate::config::PackageConfig;
use crate::error::{IdentityError, RegistryError, Result};
use crate::models::{
    CanonicalPath, DidDocument, IdentityInformation, MetadataDocument, OwnerAddress,
    ResolvedReferenceMap, RootRef, SignatureDocument, TokenLookup, DID_DOC_FILE, SIGNATURE_FILE,
};
use crate::storage::ContentStore;
use crate::wallet::Signer;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

/// An identity reconstructed from its published package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledIdentity {
    pub information: IdentityInformation,
    #[serde(rename = "identityReferences")]
    pub identity_references: ResolvedReferenceMap,
    #[serde(rename = "usedExternalKeygen")]
    pub used_external_keygen: bool,
    pub path: CanonicalPath,
    #[serde(rename = "didDocument")]
    pub did_document: DidDocument,
    pub signature: SignatureDocument,
    /// Reference to the metadata file the identity was loaded from
    pub root: RootRef,
}

/// Loads identity packages back from the ledger and the content store
pub struct PackageResolver {
    /// Content store holding the published packages
    store: Arc<dyn ContentStore>,

    /// Registry mapping tokens, owners and DIDs to root references
    registry: Arc<dyn LedgerRegistry>,

    /// Verifies package signatures
    signer: Arc<dyn Signer>,

    /// `verify_signatures` toggles the integrity check
    config: PackageConfig,
}

fn integrity(location: &str, reason: impl Into<String>) -> IdentityError {
    IdentityError::Integrity {
        location: location.to_string(),
        reason: reason.into(),
    }
}

impl PackageResolver {
    /// Creates a new PackageResolver
    ///
    /// # Arguments
    /// * `store` - Content store the packages were published to
    /// * `registry` - Read access to the ledger; its owner is irrelevant here
    /// * `signer` - Signature scheme used to verify `signature.xml`
    /// * `config` - Package settings; `verify_signatures` enables the integrity check
    pub fn new(
        store: Arc<dyn ContentStore>,
        registry: Arc<dyn LedgerRegistry>,
        signer: Arc<dyn Signer>,
        config: PackageConfig,
    ) -> Self {
        PackageResolver {
            store,
            registry,
            signer,
            config,
        }
    }

    /// Resolves the package anchored in a token, or the latest one of an owner
    /// or DID.
    ///
    /// # Errors
    /// - [`IdentityError::NotFound`] when nothing finalized matches `lookup`
    /// - [`IdentityError::MalformedDocument`] when a fetched file does not parse
    /// - [`IdentityError::Integrity`] when signature verification fails
    pub async fn resolve_from_token(&self, lookup: &TokenLookup) -> Result<AssembledIdentity> {
        let root = self
            .registry
            .resolve(lookup)
            .await?
            .ok_or_else(|| IdentityError::NotFound(lookup.to_string()))?;
        debug!("resolve: {} -> {}", lookup, root);
        self.resolve_from_cid(&root).await
    }

    /// Resolves the most recently finalized package owned by an account
    ///
    /// # Arguments
    /// * `owner` - Ledger account holding the identity tokens
    ///
    /// # Returns
    /// The identity of the owner's highest finalized token, or
    /// [`IdentityError::NotFound`] if the owner has none
    pub async fn resolve_from_address(&self, owner: &OwnerAddress) -> Result<AssembledIdentity> {
        self.resolve_from_token(&TokenLookup::Owner(owner.clone())).await
    }

    /// Resolves the most recently finalized package of a principal DID
    ///
    /// # Arguments
    /// * `did` - DID the package was issued for, e.g. `did:key:zQ3s...`
    ///
    /// # Returns
    /// The identity of the newest finalized token anchoring a package of `did`,
    /// or [`IdentityError::NotFound`] if there is none
    pub async fn resolve_from_did(&self, did: &str) -> Result<AssembledIdentity> {
        match did.parse::<TokenLookup>()? {
            lookup @ TokenLookup::Did(_) => self.resolve_from_token(&lookup).await,
            _ => Err(RegistryError::InvalidAddress(did.to_string()).into()),
        }
    }

    /// Resolves a root reference string, `{directoryCid}{path}main.xml`.
    pub async fn resolve_from_cid(&self, root: &str) -> Result<AssembledIdentity> {
        let root: RootRef = root.parse()?;
        self.resolve_from_root(&root).await
    }

    /// Loads the package whose metadata file `root` points at
    ///
    /// # Arguments
    /// * `root` - Parsed root reference; sibling files are read from the same
    ///   directory and path
    ///
    /// # Returns
    /// The identity, after checking that the metadata path matches `root`, the
    /// DID document matches the metadata and, if enabled, the signature
    pub async fn resolve_from_root(&self, root: &RootRef) -> Result<AssembledIdentity> {
        let metadata_location = root.to_string();
        let metadata_bytes = self.store.fetch(&metadata_location).await?;
        let metadata = MetadataDocument::from_bytes(&metadata_bytes, &metadata_location)?;
        if metadata.information.path().as_str() != root.path {
            return Err(IdentityError::malformed(
                &metadata_location,
                format!(
                    "package path {} differs from root reference",
                    metadata.information.path()
                ),
            ));
        }

        let signature_location = root.sibling(SIGNATURE_FILE).to_string();
        let signature_bytes = self.store.fetch(&signature_location).await?;
        let signature = SignatureDocument::from_bytes(&signature_bytes, &signature_location)?;

        let did_location = root.sibling(DID_DOC_FILE).to_string();
        let did_bytes = self.store.fetch(&did_location).await?;
        let did_document = DidDocument::from_bytes(&did_bytes).map_err(|e| match e {
            IdentityError::MalformedDocument { reason, .. } => {
                IdentityError::malformed(&did_location, reason)
            }
            other => other,
        })?;
        if did_document.id() != metadata.information.did {
            return Err(IdentityError::malformed(
                &did_location,
                format!("DID {} does not match metadata", did_document.id()),
            ));
        }

        if self.config.verify_signatures {
            self.verify(&metadata_bytes, &signature, &did_document, &signature_location)
                .await?;
        }
        info!("resolve: {} loaded from {}", metadata.information.did, root);

        let MetadataDocument {
            information,
            references,
        } = metadata;
        Ok(AssembledIdentity {
            path: information.path().clone(),
            used_external_keygen: references.used_external_keygen(),
            information,
            identity_references: references,
            did_document,
            signature,
            root: root.clone(),
        })
    }

    async fn verify(
        &self,
        metadata_bytes: &[u8],
        signature: &SignatureDocument,
        did_document: &DidDocument,
        location: &str,
    ) -> Result<()> {
        let computed = self.store.compute_cid(metadata_bytes).await?;
        if computed != signature.signed_cid {
            return Err(integrity(
                location,
                format!(
                    "signature covers {}, fetched metadata is {}",
                    signature.signed_cid, computed
                ),
            ));
        }
        if signature.signer != did_document.id() {
            return Err(integrity(
                location,
                format!("signed by {}, not {}", signature.signer, did_document.id()),
            ));
        }

        // the key must be listed by the DID document
        let public_key = signature.public_key_bytes()?;
        if !did_document.authorizes(&public_key) {
            return Err(integrity(
                location,
                format!(
                    "key {} is not a verification method of {}",
                    signature.public_key,
                    did_document.id()
                ),
            ));
        }

        let value = signature.signature_bytes()?;
        let valid = self
            .signer
            .verify(&public_key, signature.payload(), &value)
            .map_err(|e| integrity(location, e.to_string()))?;
        if !valid {
            return Err(integrity(location, "signature does not verify"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{LedgerConnector, MemoryRegistry};
    use crate::models::{Keypair, ReferenceKey, TokenId, METADATA_FILE};
    use crate::package::assembler::{AssemblyReceipt, PackageAssembler};
    use crate::package::session::IdentitySession;
    use crate::package::templates::ArtifactSet;
    use crate::package::testing::{did_document, did_document_for, keypair, owner};
    use crate::storage::MemoryStore;
    use crate::utils::serialization::to_canonical_vec;
    use crate::wallet::{
        DidDocumentBuilder, KeyDidBuilder, KeyMaterialProvider, MnemonicKeyProvider,
        RandomKeyProvider, Secp256k1Signer,
    };
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: MemoryRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                store: Arc::new(MemoryStore::new()),
                registry: MemoryRegistry::new(owner()),
            }
        }

        async fn assemble(&self, external: bool, date: (i32, u32, u32)) -> AssemblyReceipt {
            let mut session = IdentitySession::new();
            session.set_keypair(keypair(), external);
            session.set_did_document(did_document("did:example:123"));
            session.set_ledger(Arc::new(self.registry.clone()));
            session.set_issuing_date(NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap());
            self.assemble_session(&session).await
        }

        async fn assemble_session(&self, session: &IdentitySession) -> AssemblyReceipt {
            PackageAssembler::new(
                self.store.clone(),
                Arc::new(Secp256k1Signer),
                ArtifactSet::embedded(),
                PackageConfig::default(),
            )
            .assemble(session)
            .await
            .unwrap()
        }

        fn resolver(&self, verify_signatures: bool) -> PackageResolver {
            PackageResolver::new(
                self.store.clone(),
                Arc::new(self.registry.clone()),
                Arc::new(Secp256k1Signer),
                PackageConfig {
                    verify_signatures,
                    ..PackageConfig::default()
                },
            )
        }
    }

    #[tokio::test]
    async fn test_round_trip_without_external_keygen() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        let identity = fixture
            .resolver(true)
            .resolve_from_token(&TokenLookup::Token(receipt.token_id))
            .await
            .unwrap();

        let expected = IdentityInformation::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "did:example:123",
            "eu",
            false,
        );
        assert_eq!(identity.information, expected);
        assert_eq!(identity.path.as_str(), "/akn/eu/doc/2024-01-01/did:example:123/eng@/");
        assert!(!identity.used_external_keygen);
        assert_eq!(identity.identity_references.len(), 6);
        assert!(!identity.identity_references.contains(ReferenceKey::ZencodeSoftware));
        assert_eq!(
            identity.did_document.to_canonical_bytes().unwrap(),
            did_document("did:example:123").to_canonical_bytes().unwrap()
        );
        assert_eq!(identity.signature.signed_cid, receipt.metadata_cid);
        assert_eq!(identity.root, receipt.root);
    }

    #[tokio::test]
    async fn test_round_trip_with_external_keygen() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(true, (2024, 1, 1)).await;
        let identity = fixture
            .resolver(true)
            .resolve_from_cid(&receipt.root.to_string())
            .await
            .unwrap();

        assert!(identity.used_external_keygen);
        assert_eq!(identity.identity_references.len(), 7);
        let script = identity
            .identity_references
            .get(ReferenceKey::ZencodeSoftware)
            .unwrap();
        assert!(script.is_cid_qualified());
        assert!(script.href.ends_with("/eng@/create-keypair.zen"));
        assert!(identity
            .information
            .manifestation
            .component_info
            .iter()
            .any(|component| component.e_id == "mkeypairsw"));
    }

    #[tokio::test]
    async fn test_published_references_are_fetchable() {
        let fixture = Fixture::new();
        fixture.assemble(true, (2024, 1, 1)).await;
        let identity = fixture
            .resolver(true)
            .resolve_from_address(&owner())
            .await
            .unwrap();

        for (key, entry) in identity.identity_references.iter() {
            if key.is_published() {
                assert!(entry.is_cid_qualified(), "{}", key);
                let cid = identity.identity_references.cid_of(key).unwrap();
                assert!(fixture.store.fetch(cid.as_str()).await.is_ok(), "{}", key);
            } else {
                assert!(entry.href.starts_with('/') || entry.href.starts_with("did:"), "{}", key);
            }
        }
        let did_cid = identity.identity_references.cid_of(ReferenceKey::IidDidDoc).unwrap();
        assert_eq!(
            fixture.store.fetch(did_cid.as_str()).await.unwrap(),
            identity.did_document.to_canonical_bytes().unwrap()
        );
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        let entries = fixture.store.len();
        let resolver = fixture.resolver(true);
        let lookup = TokenLookup::Token(receipt.token_id);

        let first = resolver.resolve_from_token(&lookup).await.unwrap();
        let second = resolver.resolve_from_token(&lookup).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fixture.store.len(), entries);
    }

    #[tokio::test]
    async fn test_address_lookup_returns_latest_package() {
        let fixture = Fixture::new();
        fixture.assemble(false, (2024, 1, 1)).await;
        let latest = fixture.assemble(false, (2024, 6, 30)).await;

        let identity = fixture
            .resolver(true)
            .resolve_from_address(&owner())
            .await
            .unwrap();
        assert_eq!(identity.root, latest.root);
        assert_eq!(identity.information.identity_date.to_string(), "2024-06-30");
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let fixture = Fixture::new();
        let err = fixture
            .resolver(true)
            .resolve_from_token(&TokenLookup::Token(TokenId(42)))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotFound(_)));

        let stranger: OwnerAddress = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert!(matches!(
            fixture.resolver(true).resolve_from_address(&stranger).await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_metadata_is_malformed() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        fixture
            .store
            .tamper(&receipt.root.to_string(), b"<not json".to_vec())
            .unwrap();

        let err = fixture
            .resolver(true)
            .resolve_from_token(&TokenLookup::Token(receipt.token_id))
            .await
            .unwrap_err();
        match err {
            IdentityError::MalformedDocument { location, .. } => {
                assert!(location.ends_with(METADATA_FILE))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_rewritten_metadata_fails_integrity() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        let address = receipt.root.to_string();
        let mut document: serde_json::Value =
            serde_json::from_slice(&fixture.store.fetch(&address).await.unwrap()).unwrap();
        document["references"]["eidas"]["href"] = "/akn/eu/doc/2099-01-01/forged/eng@.akn".into();
        fixture
            .store
            .tamper(&address, serde_json::to_vec(&document).unwrap())
            .unwrap();

        let lookup = TokenLookup::Token(receipt.token_id);
        assert!(matches!(
            fixture.resolver(true).resolve_from_token(&lookup).await,
            Err(IdentityError::Integrity { .. })
        ));
        // without verification the rewritten document is returned as is
        let identity = fixture.resolver(false).resolve_from_token(&lookup).await.unwrap();
        assert_eq!(
            identity.identity_references.get(ReferenceKey::Eidas).unwrap().href,
            "/akn/eu/doc/2099-01-01/forged/eng@.akn"
        );
    }

    #[tokio::test]
    async fn test_invalid_root_reference_is_malformed() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.resolver(true).resolve_from_cid("no-path-here").await,
            Err(IdentityError::MalformedDocument { .. })
        ));
    }

    /// Replaces main.xml with a rewritten copy and signature.xml with a
    /// signature over it made by `signing_key`, claiming `did:example:123`.
    async fn resign(fixture: &Fixture, receipt: &AssemblyReceipt, signing_key: &Keypair) {
        let address = receipt.root.to_string();
        let mut document: serde_json::Value =
            serde_json::from_slice(&fixture.store.fetch(&address).await.unwrap()).unwrap();
        document["references"]["eidas"]["href"] = "/forged".into();
        let forged = to_canonical_vec(&document).unwrap();
        let forged_cid = fixture.store.compute_cid(&forged).await.unwrap();
        fixture.store.tamper(&address, forged).unwrap();

        let value = Secp256k1Signer.sign(signing_key, forged_cid.as_str().as_bytes()).unwrap();
        let signature = SignatureDocument::new(
            forged_cid,
            "did:example:123",
            &signing_key.public_key,
            &value,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        fixture
            .store
            .tamper(
                &receipt.root.sibling(SIGNATURE_FILE).to_string(),
                signature.to_canonical_bytes().unwrap(),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_signature_from_unlisted_key_fails_integrity() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        let stranger = Keypair::from_private_key(&[0x42u8; 32]).unwrap();
        resign(&fixture, &receipt, &stranger).await;

        let lookup = TokenLookup::Token(receipt.token_id);
        match fixture.resolver(true).resolve_from_token(&lookup).await {
            Err(IdentityError::Integrity { location, reason }) => {
                assert!(location.ends_with(SIGNATURE_FILE));
                assert!(reason.contains("not a verification method"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other.map(|identity| identity.root)),
        }
    }

    #[tokio::test]
    async fn test_signature_from_listed_key_verifies() {
        let fixture = Fixture::new();
        let receipt = fixture.assemble(false, (2024, 1, 1)).await;
        resign(&fixture, &receipt, &keypair()).await;

        let identity = fixture
            .resolver(true)
            .resolve_from_token(&TokenLookup::Token(receipt.token_id))
            .await
            .unwrap();
        assert_eq!(identity.identity_references.get(ReferenceKey::Eidas).unwrap().href, "/forged");
    }

    #[tokio::test]
    async fn test_document_without_signing_key_fails_integrity() {
        let fixture = Fixture::new();
        let stranger = Keypair::from_private_key(&[0x42u8; 32]).unwrap();
        let mut session = IdentitySession::new();
        session.set_keypair(keypair(), false);
        session.set_did_document(did_document_for("did:example:123", &stranger));
        session.set_ledger(Arc::new(fixture.registry.clone()));
        let receipt = fixture.assemble_session(&session).await;

        assert!(matches!(
            fixture.resolver(true).resolve_from_cid(&receipt.root.to_string()).await,
            Err(IdentityError::Integrity { .. })
        ));
    }

    #[tokio::test]
    async fn test_did_lookup_returns_latest_package() {
        let fixture = Fixture::new();
        fixture.assemble(false, (2024, 1, 1)).await;
        let latest = fixture.assemble(true, (2024, 6, 30)).await;

        let identity = fixture
            .resolver(true)
            .resolve_from_did("did:example:123")
            .await
            .unwrap();
        assert_eq!(identity.root, latest.root);
        assert!(identity.used_external_keygen);

        assert!(matches!(
            fixture.resolver(true).resolve_from_did("did:example:404").await,
            Err(IdentityError::NotFound(_))
        ));
        assert!(matches!(
            fixture.resolver(true).resolve_from_did("0x00000000000000000000000000000000000000a1").await,
            Err(IdentityError::Registry(RegistryError::InvalidAddress(_)))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_across_key_sources() {
        let fixture = Fixture::new();
        let providers: Vec<Box<dyn KeyMaterialProvider>> = vec![
            Box::new(RandomKeyProvider),
            Box::new(RandomKeyProvider),
            Box::new(MnemonicKeyProvider::new(Some(PHRASE.into()), Some(0))),
            Box::new(MnemonicKeyProvider::new(Some(PHRASE.into()), Some(3))),
        ];

        for provider in &providers {
            let keypair = provider.provide().await.unwrap();
            let document = KeyDidBuilder.build(&keypair).unwrap();
            for external in [false, true] {
                let mut session = IdentitySession::new();
                session.set_keypair(keypair.clone(), external);
                session.set_did_document(document.clone());
                session.set_ledger(fixture.registry.connect(&keypair).await.unwrap());
                session.set_issuing_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
                let receipt = fixture.assemble_session(&session).await;

                let resolver = fixture.resolver(true);
                let by_token = resolver
                    .resolve_from_token(&TokenLookup::Token(receipt.token_id))
                    .await
                    .unwrap();
                let by_did = resolver.resolve_from_did(document.id()).await.unwrap();
                assert_eq!(by_token, by_did);

                assert_eq!(by_token.used_external_keygen, external);
                assert_eq!(
                    by_token.did_document.to_canonical_bytes().unwrap(),
                    document.to_canonical_bytes().unwrap()
                );
                assert_eq!(by_token.information.did, document.id());
                assert_eq!(by_token.signature.public_key_bytes().unwrap(), keypair.public_key);

                let mut expected: BTreeSet<ReferenceKey> =
                    ReferenceKey::REQUIRED.iter().copied().collect();
                if external {
                    expected.insert(ReferenceKey::ZencodeSoftware);
                }
                let keys: BTreeSet<ReferenceKey> = by_token.identity_references.keys().collect();
                assert_eq!(keys, expected);
            }
        }
    }
}
