// src/package/session.rs
//! Identity session: the principal's inputs to one package assembly.

use crate::blockchain::LedgerRegistry;
use crate::error::{IdentityError, Result};
use crate::models::{DidDocument, Keypair};
use crate::wallet::{DidDocumentBuilder, KeyMaterialProvider};
use chrono::NaiveDate;
use std::sync::Arc;

/// Holds the keypair, DID document and ledger handle of one principal.
///
/// Each input may be missing until set; the assembler checks them all before
/// touching the ledger.
#[derive(Default)]
pub struct IdentitySession {
    keypair: Option<Keypair>,
    did_document: Option<DidDocument>,
    ledger: Option<Arc<dyn LedgerRegistry>>,
    used_external_keygen: bool,
    issuing_date: Option<NaiveDate>,
}

impl IdentitySession {
    pub fn new() -> Self {
        IdentitySession::default()
    }

    /// Obtains the keypair from `provider`; records whether it was external.
    pub async fn create_keypair(&mut self, provider: &dyn KeyMaterialProvider) -> Result<()> {
        self.keypair = Some(provider.provide().await?);
        self.used_external_keygen = provider.is_external();
        Ok(())
    }

    pub fn set_keypair(&mut self, keypair: Keypair, used_external_keygen: bool) {
        self.keypair = Some(keypair);
        self.used_external_keygen = used_external_keygen;
    }

    /// Builds the DID document from the session keypair.
    pub fn create_did_document(&mut self, builder: &dyn DidDocumentBuilder) -> Result<()> {
        let document = builder.build(self.keypair()?)?;
        self.did_document = Some(document);
        Ok(())
    }

    pub fn set_did_document(&mut self, document: DidDocument) {
        self.did_document = Some(document);
    }

    pub fn set_ledger(&mut self, ledger: Arc<dyn LedgerRegistry>) {
        self.ledger = Some(ledger);
    }

    /// Pins the issuing date instead of using today's (UTC) date.
    pub fn set_issuing_date(&mut self, date: NaiveDate) {
        self.issuing_date = Some(date);
    }

    pub fn keypair(&self) -> Result<&Keypair> {
        self.keypair.as_ref().ok_or(IdentityError::Precondition("keypair"))
    }

    pub fn did_document(&self) -> Result<&DidDocument> {
        self.did_document
            .as_ref()
            .ok_or(IdentityError::Precondition("DID document"))
    }

    pub fn ledger(&self) -> Result<Arc<dyn LedgerRegistry>> {
        self.ledger
            .clone()
            .ok_or(IdentityError::Precondition("ledger session"))
    }

    pub fn used_external_keygen(&self) -> bool {
        self.used_external_keygen
    }

    pub fn issuing_date(&self) -> NaiveDate {
        self.issuing_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}
