// src/package/assembler.rs
//! Package assembly: keypair and DID document in, anchored signed package out.
//!
//! # Pipeline
//! Phases run strictly in order, each consuming the previous one's output:
//! 1. Reserve a token on the ledger
//! 2. Build the reference template for the canonical path
//! 3. Push every locally available reference artifact (concurrently) and
//!    resolve the template into CID-qualified references
//! 4. Build, serialize and push the metadata document
//! 5. Sign the metadata CID and push the signature document
//! 6. Publish every file under the canonical path as one directory
//! 7. Finalize the reserved token with `{directoryCid}{path}main.xml`
//!
//! Any failure stops the pipeline with the stage it happened in. The token is
//! then abandoned through the reservation guard and never finalized.

use super::session::IdentitySession;
use super::templates::ArtifactSet;
use crate::blockchain::Reservation;
use crate::config::PackageConfig;
use crate::error::{AssemblyStage, IdentityError, Result};
use crate::models::{
    Cid, DidDocument, IdentityInformation, MetadataDocument, ReferenceKey, ReferenceTemplate,
    RootRef, SignatureDocument, TokenId, METADATA_FILE, SIGNATURE_FILE,
};
use crate::storage::{ContentStore, StoredFile};
use crate::wallet::Signer;
use futures::future::try_join_all;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReceipt {
    /// Token finalized with `root`
    pub token_id: TokenId,
    /// `{directoryCid}{path}main.xml`, as stored on the ledger
    pub root: RootRef,
    /// CID of the metadata document, which is what the signature covers
    pub metadata_cid: Cid,
    pub signature_cid: Cid,
}

/// Builds identity packages and anchors them on the ledger
///
/// One assembler serves any number of sessions: it holds no per-identity state,
/// and the ledger session travels with each [`IdentitySession`].
pub struct PackageAssembler {
    /// Content store every package file is pushed to
    store: Arc<dyn ContentStore>,

    /// Signs the metadata CID with the session keypair
    signer: Arc<dyn Signer>,

    /// Auxiliary artifacts (issuer software, smart contract, keygen script)
    artifacts: ArtifactSet,

    /// Jurisdiction and resolution settings
    config: PackageConfig,
}

impl PackageAssembler {
    /// Creates a new PackageAssembler
    ///
    /// # Arguments
    /// * `store` - Content store the package is published to
    /// * `signer` - Signature scheme applied to the metadata CID
    /// * `artifacts` - Contents of the auxiliary reference artifacts
    /// * `config` - Package settings; `jurisdiction` becomes part of the canonical path
    ///
    /// # Returns
    /// An assembler ready to run [`PackageAssembler::assemble`]
    pub fn new(
        store: Arc<dyn ContentStore>,
        signer: Arc<dyn Signer>,
        artifacts: ArtifactSet,
        config: PackageConfig,
    ) -> Self {
        PackageAssembler {
            store,
            signer,
            artifacts,
            config,
        }
    }

    /// Assembles, publishes and anchors the package of `session`.
    ///
    /// # Errors
    /// - [`IdentityError::Precondition`] when the keypair, ledger session or DID
    ///   document is missing; nothing has been reserved yet
    /// - [`IdentityError::Assembly`] carrying the failed stage otherwise. An
    ///   invalid jurisdiction is reported as `build-references` before any
    ///   token is reserved
    pub async fn assemble(&self, session: &IdentitySession) -> Result<AssemblyReceipt> {
        let keypair = session.keypair()?;
        let ledger = session.ledger()?;
        let did_document = session.did_document()?;
        let used_external_keygen = session.used_external_keygen();
        // static configuration, checked before anything is minted
        self.check_jurisdiction()?;

        // 1. reserve
        let reservation = Reservation::acquire(ledger)
            .await
            .map_err(|e| IdentityError::assembly(AssemblyStage::ReserveToken, e))?;
        info!(
            "assembly: reserved token {:?} for {}",
            reservation.token_id(),
            did_document.id()
        );

        // 2. template
        let date = session.issuing_date();
        let information = IdentityInformation::new(
            date,
            did_document.id(),
            &self.config.jurisdiction,
            used_external_keygen,
        );
        let path = information.path().clone();
        let template = ReferenceTemplate::new(did_document.id(), &path, used_external_keygen);
        debug!("assembly: canonical path {}", path);

        // 3. references
        let (references, mut files) = self.publish_references(template, did_document).await?;

        // 4. metadata
        let metadata = MetadataDocument::new(information, references);
        let metadata_bytes = metadata
            .to_canonical_bytes()
            .map_err(|e| IdentityError::assembly(AssemblyStage::PublishMetadata, e))?;
        let metadata_cid = self
            .store
            .push(METADATA_FILE, metadata_bytes.clone())
            .await
            .map_err(|e| IdentityError::assembly(AssemblyStage::PublishMetadata, e))?;
        files.push(StoredFile::new(METADATA_FILE, metadata_bytes));
        debug!("assembly: metadata {}", metadata_cid);

        // 5. signature
        let signature = self
            .signer
            .sign(keypair, metadata_cid.as_str().as_bytes())
            .map_err(|e| IdentityError::assembly(AssemblyStage::Sign, e))?;
        let signature_document = SignatureDocument::new(
            metadata_cid.clone(),
            did_document.id(),
            &keypair.public_key,
            &signature,
            date,
        );
        let signature_bytes = signature_document
            .to_canonical_bytes()
            .map_err(|e| IdentityError::assembly(AssemblyStage::Sign, e))?;
        let signature_cid = self
            .store
            .push(SIGNATURE_FILE, signature_bytes.clone())
            .await
            .map_err(|e| IdentityError::assembly(AssemblyStage::Sign, e))?;
        files.push(StoredFile::new(SIGNATURE_FILE, signature_bytes));

        // 6. directory
        let directory = self
            .store
            .publish_directory(path.as_str(), &files)
            .await
            .map_err(|e| IdentityError::assembly(AssemblyStage::PublishDirectory, e))?;
        let root = RootRef::new(directory, path.as_str(), METADATA_FILE);

        // 7. finalize
        let token_id = reservation
            .finalize(&root)
            .await
            .map_err(|e| IdentityError::assembly(AssemblyStage::FinalizeToken, e))?;
        info!("assembly: token {} anchored at {}", token_id, root);

        Ok(AssemblyReceipt {
            token_id,
            root,
            metadata_cid,
            signature_cid,
        })
    }

    fn check_jurisdiction(&self) -> Result<()> {
        let jurisdiction = &self.config.jurisdiction;
        if jurisdiction.is_empty() || jurisdiction.contains('/') {
            return Err(IdentityError::assembly(
                AssemblyStage::BuildReferences,
                format!("invalid jurisdiction `{}`", jurisdiction),
            ));
        }
        Ok(())
    }

    /// Pushes the content of every published key, one task per key, and
    /// resolves the template with the returned CIDs.
    async fn publish_references(
        &self,
        template: ReferenceTemplate,
        did_document: &DidDocument,
    ) -> Result<(crate::models::ResolvedReferenceMap, Vec<StoredFile>)> {
        let stage = AssemblyStage::PublishReferences;

        let mut files = Vec::new();
        for key in template.published_keys() {
            let name = key
                .local_file()
                .ok_or_else(|| IdentityError::assembly(stage, format!("`{}` has no file", key)))?;
            let content = match key {
                ReferenceKey::IidDidDoc => did_document
                    .to_canonical_bytes()
                    .map_err(|e| IdentityError::assembly(stage, e))?,
                _ => self
                    .artifacts
                    .content(key)
                    .ok_or_else(|| {
                        IdentityError::assembly(stage, format!("no artifact for `{}`", key))
                    })?
                    .to_vec(),
            };
            files.push((key, StoredFile::new(name, content)));
        }

        let pushes = files.iter().map(|(key, file)| {
            let store = self.store.clone();
            async move {
                let cid = store.push(&file.name, file.content.clone()).await?;
                debug!("assembly: {} -> {}", key, cid);
                Ok::<_, crate::error::StoreError>((*key, cid))
            }
        });
        let cids: HashMap<ReferenceKey, Cid> = try_join_all(pushes)
            .await
            .map_err(|e| IdentityError::assembly(stage, e))?
            .into_iter()
            .collect();

        let references = template
            .resolve(&cids)
            .map_err(|key| IdentityError::assembly(stage, format!("no CID for `{}`", key)))?;
        Ok((references, files.into_iter().map(|(_, file)| file).collect()))
    }
}
