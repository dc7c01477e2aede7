//! Type-erased payloads flowing between nodes.
//!
//! `Value::Null` doubles as "void". Multi-path outputs are arrays in
//! argument order.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::PathwayResult;

pub use serde_json::Value;

/// Canonical serialized form used as the value-equality key.
///
/// serde_json keeps object keys sorted, so structurally equal values
/// produce identical keys.
pub fn input_key(value: &Value) -> String {
    value.to_string()
}

pub fn to_value<T: Serialize>(value: T) -> PathwayResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> PathwayResult<T> {
    Ok(serde_json::from_value(value)?)
}
