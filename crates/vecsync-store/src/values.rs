//! Conversion between JSON primary-key values and SQL values.
//!
//! Queue entries and error records carry primary-key values as JSON;
//! binding them back against typed source columns needs real SQL
//! values, not JSON text (a JSON-encoded string would not match a TEXT
//! column because of the surrounding quotes).

use rusqlite::types::{Value, ValueRef};

use crate::errors::{Result, StoreError};

/// Convert a JSON value into a bindable SQL value.
pub fn json_to_sql(value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Real(f))
            } else {
                Err(StoreError::UnsupportedKeyValue(n.to_string()))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(StoreError::UnsupportedKeyValue(other.to_string())),
    }
}

/// Convert a SQL value read from a key column into JSON.
pub fn sql_to_json(value: ValueRef<'_>) -> Result<serde_json::Value> {
    match value {
        ValueRef::Null => Ok(serde_json::Value::Null),
        ValueRef::Integer(i) => Ok(serde_json::Value::from(i)),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| StoreError::UnsupportedKeyValue(format!("non-finite real {f}"))),
        ValueRef::Text(t) => Ok(serde_json::Value::String(
            String::from_utf8_lossy(t).into_owned(),
        )),
        ValueRef::Blob(_) => Err(StoreError::UnsupportedKeyValue(
            "BLOB primary-key columns are not supported".into(),
        )),
    }
}

/// Convert a whole JSON key tuple into bindable SQL values.
pub fn pk_to_sql(pk: &[serde_json::Value]) -> Result<Vec<Value>> {
    pk.iter().map(json_to_sql).collect()
}
