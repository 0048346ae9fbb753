//! Canonical JSON and truncated SHA-256 helpers.
//!
//! Every digest in a receipt is a hex prefix of SHA-256. Hash inputs that
//! contain JSON go through [`canonicalize`] first so object key order never
//! leaks into a digest.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Full lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First `len` hex characters of SHA-256 over `input`.
pub fn sha256_prefix(input: &str, len: usize) -> String {
    let mut h = sha256_hex(input.as_bytes());
    h.truncate(len);
    h
}

/// Deterministic JSON canonicalization: object keys sorted recursively,
/// arrays kept in order.
pub fn canonicalize(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize).collect()),
        _ => v.clone(),
    }
}

/// Compact canonical serialization of `v`.
pub fn canonical_json(v: &Value) -> String {
    canonicalize(v).to_string()
}

/// True when `s` is exactly `len` lowercase hex digits.
pub fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let v = json!({"b": {"y": 1, "x": [ {"d": 1, "c": 2} ]}, "a": true});
        assert_eq!(
            canonical_json(&v),
            r#"{"a":true,"b":{"x":[{"c":2,"d":1}],"y":1}}"#
        );
    }

    #[test]
    fn sha256_prefix_matches_known_vector() {
        // sha256("abc")
        assert_eq!(sha256_prefix("abc", 8), "ba7816bf");
        assert_eq!(sha256_prefix("abc", 100).len(), 64);
    }

    #[test]
    fn hex_shape_check() {
        assert!(is_hex_of_len("0123abcd", 8));
        assert!(!is_hex_of_len("0123ABCD", 8));
        assert!(!is_hex_of_len("0123abc", 8));
    }
}
