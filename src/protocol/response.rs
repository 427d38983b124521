//! Per-descriptor results returned by the management proxy

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

pub const STATUS_OK: u16 = 200;

/// One entry of a batch response, in the same position as its request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadResponse {
    pub status: u16,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReadResponse {
    pub fn ok(value: Value) -> Self {
        Self {
            status: STATUS_OK,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            value: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Failure-detector view carried by a successful response
    ///
    /// Returns `None` for failed responses or values that are not objects.
    pub fn peer_states(&self) -> Option<BTreeMap<String, String>> {
        if !self.is_success() {
            return None;
        }
        let object = self.value.as_ref()?.as_object()?;
        Some(
            object
                .iter()
                .map(|(address, status)| {
                    let status = match status {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (address.clone(), status)
                })
                .collect(),
        )
    }

    /// String attribute carried by a successful response
    pub fn string_value(&self) -> Option<&str> {
        if !self.is_success() {
            return None;
        }
        self.value.as_ref()?.as_str().filter(|s| !s.is_empty())
    }
}

/// Blank out credential fields the proxy echoes back inside `request`
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if key == "password" || key == "user" {
                    *inner = Value::String("***".to_string());
                } else {
                    redact(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
