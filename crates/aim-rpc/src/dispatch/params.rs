//! Strict params decoding helpers shared by every family handler (spec
//! §4.8 step 11: positional arrays with fixed arity, alternate
//! single-object forms, strict non-negative integer checks including
//! NaN/Infinity rejection, and list-operation length caps).

use aim_core::errors::{AimError, Result};
use serde_json::Value;

pub const MAX_LIST_LIMIT: i64 = 1_000;
pub const MAX_LIST_OFFSET: i64 = 1_000_000;

/// Read `params` as a positional array of exactly `arity` elements, or
/// reject as invalid-params.
pub fn positional(params: &Value, arity: usize) -> Result<&[Value]> {
    match params.as_array() {
        Some(arr) if arr.len() == arity => Ok(arr.as_slice()),
        Some(arr) => Err(AimError::invalid(format!("expected {arity} positional params, got {}", arr.len()))),
        None => Err(AimError::invalid("params must be a positional array")),
    }
}

pub fn as_str<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| AimError::invalid(format!("{field} must be a string")))
}

pub fn as_opt_str(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_owned())
}

pub fn as_bool(value: &Value, field: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| AimError::invalid(format!("{field} must be a boolean")))
}

/// A strict non-negative integer: rejects floats, NaN/Infinity (which
/// `serde_json` represents only as non-finite — never actually
/// constructible from valid JSON, but a defensive check all the same for
/// any numeric coercion upstream), and negative values.
pub fn as_non_negative_int(value: &Value, field: &str) -> Result<i64> {
    let n = value.as_i64().ok_or_else(|| AimError::invalid(format!("{field} must be a non-negative integer")))?;
    if n < 0 {
        return Err(AimError::invalid(format!("{field} must be non-negative")));
    }
    Ok(n)
}

/// Decode and cap a `limit` parameter per spec §4.8 step 11 (`limit ≤
/// 1000`).
pub fn list_limit(value: &Value) -> Result<i64> {
    let n = as_non_negative_int(value, "limit")?;
    if n > MAX_LIST_LIMIT {
        return Err(AimError::invalid(format!("limit exceeds {MAX_LIST_LIMIT}")));
    }
    Ok(n)
}

/// Decode and cap an `offset` parameter per spec §4.8 step 11 (`offset ≤
/// 1 000 000`).
pub fn list_offset(value: &Value) -> Result<i64> {
    let n = as_non_negative_int(value, "offset")?;
    if n > MAX_LIST_OFFSET {
        return Err(AimError::invalid(format!("offset exceeds {MAX_LIST_OFFSET}")));
    }
    Ok(n)
}
