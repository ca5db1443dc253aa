//! Canonical JSON normalization and digest computation (RFC 8785-class).
//!
//! Evidence hashes are only reproducible if every payload serializes to the
//! same bytes. This module provides:
//! - UTF-16 code unit ordering for object keys (§3.2.3)
//! - Number normalization (integer-valued floats → integers; reject NaN/Infinity)
//! - SHA-256 hex digest computation

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::{KernelError, Result};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Recursively sort JSON object keys using UTF-16 code unit ordering (RFC 8785 §3.2.3).
fn sort_keys_utf16(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys_utf16).collect())
        }
        other => other.clone(),
    }
}

/// Normalize numbers: integer-valued floats → integer repr; reject NaN/Infinity.
fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map.iter() {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => {
            let normalized = arr
                .iter()
                .map(normalize_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(serde_json::Value::Array(normalized))
        }
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Ok(serde_json::Value::Number(n.clone()));
            }
            match n.as_f64() {
                Some(f) if !f.is_finite() => Err(KernelError::NonCanonical(
                    "NaN/Infinity not permitted in canonical JSON".to_string(),
                )),
                // -0.0 collapses to 0 here as well
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(serde_json::Value::Number(serde_json::Number::from(f as i64)))
                }
                _ => Ok(serde_json::Value::Number(n.clone())),
            }
        }
        other => Ok(other.clone()),
    }
}

/// Convert JSON value to canonical form: normalize numbers → sort keys → compact JSON.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    let sorted = sort_keys_utf16(&normalized);
    Ok(serde_json::to_string(&sorted)?)
}

/// Compute SHA-256 hex digest of canonical JSON.
pub fn compute_digest(value: &serde_json::Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Serialize any value and digest its canonical JSON form.
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    compute_digest(&json)
}

/// Whether `s` looks like a digest produced by [`compute_digest`].
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_integer_float() {
        let input = serde_json::json!({ "value": 1.0 });
        let canonical = canonical_json(&input).expect("canonical_json");
        assert_eq!(canonical, r#"{"value":1}"#);
    }

    #[test]
    fn test_canonical_json_negative_and_zero_floats() {
        let input = serde_json::json!({ "a": -1.0, "b": 0.0, "c": -0.0 });
        let canonical = canonical_json(&input).expect("canonical_json");
        assert_eq!(canonical, r#"{"a":-1,"b":0,"c":0}"#);
    }

    #[test]
    fn test_canonical_json_fractional_float() {
        let input = serde_json::json!({ "value": 1.5 });
        let canonical = canonical_json(&input).expect("canonical_json");
        assert_eq!(canonical, r#"{"value":1.5}"#);
    }

    #[test]
    fn test_canonical_json_field_order_invariant() {
        let input1 = serde_json::json!({ "a": 1, "b": { "z": 1, "y": 2 }, "c": 3 });
        let input2 = serde_json::json!({ "c": 3, "b": { "y": 2, "z": 1 }, "a": 1 });
        assert_eq!(
            canonical_json(&input1).expect("canonical 1"),
            canonical_json(&input2).expect("canonical 2")
        );
    }

    #[test]
    fn test_canonical_json_array_order_preserved() {
        let input1 = serde_json::json!({ "array": [3, 1, 2] });
        let input2 = serde_json::json!({ "array": [1, 2, 3] });
        assert_ne!(
            canonical_json(&input1).expect("canonical 1"),
            canonical_json(&input2).expect("canonical 2")
        );
    }

    #[test]
    fn test_compute_digest_golden_value() {
        let input = serde_json::json!({
            "solver": "exact",
            "seed": 42,
            "problem_id": "ops.thermal/2025-01-15"
        });
        let digest = compute_digest(&input).expect("compute_digest");
        assert_eq!(
            digest,
            "5cf21f4d227e1930bfce08ca2483536529c94107f22639269582b8177d882227"
        );
        assert!(is_hex_digest(&digest));
    }

    #[test]
    fn test_compute_digest_single_field_delta() {
        let a = serde_json::json!({ "seed": 42 });
        let b = serde_json::json!({ "seed": 43 });
        assert_ne!(
            compute_digest(&a).expect("digest a"),
            compute_digest(&b).expect("digest b")
        );
    }

    #[test]
    fn test_digest_of_struct_matches_value_digest() {
        #[derive(Serialize)]
        struct Probe {
            seed: u64,
            solver: &'static str,
        }
        let probe = Probe {
            seed: 7,
            solver: "heuristic",
        };
        let via_struct = digest_of(&probe).expect("digest_of");
        let via_value =
            compute_digest(&serde_json::json!({ "solver": "heuristic", "seed": 7 })).expect("value");
        assert_eq!(via_struct, via_value);
    }

    #[test]
    fn test_is_hex_digest_rejects_uppercase_and_short() {
        assert!(!is_hex_digest("abc"));
        assert!(!is_hex_digest(&"A".repeat(64)));
        assert!(is_hex_digest(&"a".repeat(64)));
    }
}
