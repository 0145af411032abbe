// src/models/metadata.rs
//! Metadata document (`main.xml`) of an identity package.
//!
//! The document follows the Akoma Ntoso FRBR layout: a work/expression/
//! manifestation description of the identity plus the resolved reference map.
//! It never contains its own CID; the signature document points at it instead.

use crate::error::IdentityError;
use crate::models::reference::{
    ResolvedReferenceMap, ISSUER_SOFTWARE_FILE, KEYGEN_SCRIPT_FILE, SMART_CONTRACT_FILE,
};
use crate::utils::serialization::{from_slice, to_canonical_vec};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const METADATA_FILE: &str = "main.xml";
pub const LANGUAGE: &str = "eng";

/// `/akn/{jurisdiction}/doc/{date}/{did}/eng@/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn new(jurisdiction: &str, date: NaiveDate, did: &str) -> Self {
        CanonicalPath(format!(
            "/akn/{}/doc/{}/{}/{}@/",
            jurisdiction,
            date.format("%Y-%m-%d"),
            did,
            LANGUAGE
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Language-independent prefix of the work: the path without `eng@/`.
    pub fn work_prefix(&self) -> &str {
        self.0.trim_end_matches(&format!("{}@/", LANGUAGE))
    }

    /// The package as a whole: the path without its trailing slash, plus `.akn`.
    pub fn package_ref(&self) -> String {
        format!("{}.akn", self.0.trim_end_matches('/'))
    }
}

impl TryFrom<String> for CanonicalPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !value.starts_with("/akn/") || !value.ends_with("@/") {
            return Err(format!("`{}` is not a canonical package path", value));
        }
        Ok(CanonicalPath(value))
    }
}

impl From<CanonicalPath> for String {
    fn from(path: CanonicalPath) -> Self {
        path.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrbrWork {
    #[serde(rename = "FRBRthis")]
    pub this: String,
    #[serde(rename = "FRBRuri")]
    pub uri: CanonicalPath,
    #[serde(rename = "FRBRdate")]
    pub date: NaiveDate,
    #[serde(rename = "FRBRauthor")]
    pub author: String,
    #[serde(rename = "FRBRcountry")]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrbrExpression {
    #[serde(rename = "FRBRthis")]
    pub this: String,
    #[serde(rename = "FRBRlanguage")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    #[serde(rename = "@eId")]
    pub e_id: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@showAs")]
    pub show_as: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrbrManifestation {
    #[serde(rename = "FRBRthis")]
    pub this: String,
    #[serde(rename = "componentInfo")]
    pub component_info: Vec<ComponentData>,
}

/// Dated identity description embedded in the metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInformation {
    #[serde(rename = "identityDate")]
    pub identity_date: NaiveDate,
    pub did: String,
    #[serde(rename = "FRBRWork")]
    pub work: FrbrWork,
    #[serde(rename = "FRBRExpression")]
    pub expression: FrbrExpression,
    #[serde(rename = "FRBRManifestation")]
    pub manifestation: FrbrManifestation,
}

impl IdentityInformation {
    pub fn new(
        issuing_date: NaiveDate,
        did: &str,
        jurisdiction: &str,
        used_external_keygen: bool,
    ) -> Self {
        let path = CanonicalPath::new(jurisdiction, issuing_date, did);
        let mut components = vec![
            ComponentData {
                e_id: "msoftware".into(),
                href: ISSUER_SOFTWARE_FILE.into(),
                name: "IntelligibleIdentity1.0.1".into(),
                show_as: "IntelligibleIdentity 1.0.1 Software".into(),
            },
            ComponentData {
                e_id: "msmartcontract".into(),
                href: SMART_CONTRACT_FILE.into(),
                name: "IntelligibleIdentity".into(),
                show_as: "IntelligibleIdentity Smart Contract".into(),
            },
        ];
        if used_external_keygen {
            components.push(ComponentData {
                e_id: "mkeypairsw".into(),
                href: KEYGEN_SCRIPT_FILE.into(),
                name: KEYGEN_SCRIPT_FILE.into(),
                show_as: "create-keypair 1.0 Zencode Software".into(),
            });
        }

        IdentityInformation {
            identity_date: issuing_date,
            did: did.to_string(),
            work: FrbrWork {
                this: format!("{}main", path.work_prefix()),
                uri: path.clone(),
                date: issuing_date,
                author: did.to_string(),
                country: jurisdiction.to_string(),
            },
            expression: FrbrExpression {
                this: format!("{}main", path),
                language: LANGUAGE.to_string(),
            },
            manifestation: FrbrManifestation {
                this: format!("{}{}", path, METADATA_FILE),
                component_info: components,
            },
        }
    }

    pub fn path(&self) -> &CanonicalPath {
        &self.work.uri
    }
}

/// Root document of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub information: IdentityInformation,
    pub references: ResolvedReferenceMap,
}

impl MetadataDocument {
    pub fn new(information: IdentityInformation, references: ResolvedReferenceMap) -> Self {
        MetadataDocument {
            information,
            references,
        }
    }

    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        to_canonical_vec(self).map_err(|e| IdentityError::malformed(METADATA_FILE, e))
    }

    /// Parses fetched bytes; `location` names the source in errors.
    pub fn from_bytes(bytes: &[u8], location: &str) -> Result<Self, IdentityError> {
        let document: MetadataDocument =
            from_slice(bytes).map_err(|e| IdentityError::malformed(location, e))?;
        if document.information.did != document.information.work.author {
            return Err(IdentityError::malformed(location, "work author differs from DID"));
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pointer::Cid;
    use crate::models::reference::{ReferenceKey, ReferenceTemplate};
    use std::collections::HashMap;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn document(used_external_keygen: bool) -> MetadataDocument {
        let information =
            IdentityInformation::new(date(), "did:example:123", "eu", used_external_keygen);
        let template =
            ReferenceTemplate::new("did:example:123", information.path(), used_external_keygen);
        let cids: HashMap<ReferenceKey, Cid> = template
            .published_keys()
            .into_iter()
            .map(|key| (key, Cid::new("QmContent")))
            .collect();
        MetadataDocument::new(information, template.resolve(&cids).unwrap())
    }

    #[test]
    fn test_canonical_path_shape() {
        let path = CanonicalPath::new("eu", date(), "did:example:123");
        assert_eq!(path.as_str(), "/akn/eu/doc/2024-01-01/did:example:123/eng@/");
        assert_eq!(path.package_ref(), "/akn/eu/doc/2024-01-01/did:example:123/eng@.akn");
        assert_eq!(path.work_prefix(), "/akn/eu/doc/2024-01-01/did:example:123/");
    }

    #[test]
    fn test_canonical_path_rejects_foreign_paths() {
        assert!(CanonicalPath::try_from("/tmp/x/".to_string()).is_err());
        assert!(CanonicalPath::try_from("/akn/eu/doc".to_string()).is_err());
    }

    #[test]
    fn test_information_components_follow_keygen_flag() {
        let plain = IdentityInformation::new(date(), "did:example:123", "eu", false);
        assert_eq!(plain.manifestation.component_info.len(), 2);
        let external = IdentityInformation::new(date(), "did:example:123", "eu", true);
        assert_eq!(external.manifestation.component_info[2].e_id, "mkeypairsw");
    }

    #[test]
    fn test_metadata_serializes_identity_date() {
        let bytes = document(false).to_canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""identityDate":"2024-01-01""#));
        assert!(text.contains(r#""FRBRuri":"/akn/eu/doc/2024-01-01/did:example:123/eng@/""#));
    }

    #[test]
    fn test_metadata_round_trip() {
        let doc = document(true);
        let bytes = doc.to_canonical_bytes().unwrap();
        let back = MetadataDocument::from_bytes(&bytes, "QmRoot/main.xml").unwrap();
        assert_eq!(back, doc);
        assert!(back.references.used_external_keygen());
        assert_eq!(back.to_canonical_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_corrupted_metadata_is_malformed() {
        let mut bytes = document(false).to_canonical_bytes().unwrap();
        bytes.truncate(bytes.len() / 2);
        let err = MetadataDocument::from_bytes(&bytes, "QmRoot/main.xml").unwrap_err();
        assert!(matches!(err, IdentityError::MalformedDocument { .. }));
    }
}
