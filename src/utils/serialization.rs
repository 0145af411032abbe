// src/utils/serialization.rs
//! Serialization utilities for package documents.
//!
//! Every document written to the content store goes through
//! [`to_canonical_vec`], the JSON Canonicalization Scheme (RFC 8785): no
//! whitespace and object members sorted by key at every nesting level. Two
//! serializations of equal values are byte-identical, which keeps CIDs stable
//! across assemble/resolve round-trips.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a value to its canonical JSON bytes.
///
/// # Returns
/// - `Ok(Vec<u8>)` with JCS bytes on success
/// - `Err(serde_json::Error)` if the value cannot be represented as JSON
pub fn to_canonical_vec<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(data)
}

/// Deserializes a document from raw bytes.
///
/// # Returns
/// - `Ok(T)` with the deserialized value
/// - `Err(serde_json::Error)` if the bytes are not valid JSON for `T`
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        zeta: u8,
        alpha: Vec<Value>,
    }

    #[test]
    fn test_nested_members_are_sorted() {
        let value = json!({ "b": { "y": 1, "x": [ { "d": 0, "c": 1 } ] }, "a": null });
        assert_eq!(
            String::from_utf8(to_canonical_vec(&value).unwrap()).unwrap(),
            r#"{"a":null,"b":{"x":[{"c":1,"d":0}],"y":1}}"#
        );
    }

    #[test]
    fn test_struct_round_trip_is_byte_stable() {
        let sample = Sample { zeta: 3, alpha: vec![json!({ "k": "v", "a": 1 })] };
        let bytes = to_canonical_vec(&sample).unwrap();
        assert_eq!(String::from_utf8(bytes.clone()).unwrap(), r#"{"alpha":[{"a":1,"k":"v"}],"zeta":3}"#);

        let back: Sample = from_slice(&bytes).unwrap();
        assert_eq!(back, sample);
        assert_eq!(to_canonical_vec(&back).unwrap(), bytes);
    }

    #[test]
    fn test_unrepresentable_value_is_an_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1u8, 2u8), "tuple keys have no JSON form");
        assert!(to_canonical_vec(&map).is_err());
    }

    #[test]
    fn test_from_slice_rejects_garbage() {
        assert!(from_slice::<Sample>(b"\x00\x01garbage").is_err());
    }
}
