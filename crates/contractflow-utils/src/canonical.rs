//! Canonical JSON emission and content digests.
//!
//! Every JSON document contractflow persists or prints in machine-readable
//! form goes through [`emit_jcs`] so that equal documents produce equal bytes.

use anyhow::{Context, Result};
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// ```rust
/// use contractflow_utils::canonical::emit_jcs;
///
/// let value = serde_json::json!({"b": 1, "a": [true, null]});
/// assert_eq!(emit_jcs(&value).unwrap(), r#"{"a":[true,null],"b":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// BLAKE3 digest (hex) of the canonical form of `value`.
///
/// Two values that differ only in key order share a digest.
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String> {
    let canonical = emit_jcs(value)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}
