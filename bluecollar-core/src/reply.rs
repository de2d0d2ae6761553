//! Reply codec.
//!
//! The original wire format mixed bare JSON values, bare error strings, and
//! structured error records with no way for a gateway to reliably tell them
//! apart (see Design Notes, "Error channel"). `Reply` replaces that mix with
//! a small tagged union: a plain result, a structured error, or a `no_exec`
//! presence record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured error, as pushed by the executor when the callable raises,
/// or by the worker when the method can't be resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub message: String,
    pub response_code: u16,
    pub error: bool,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, response_code: u16) -> Self {
        Self {
            message: message.into(),
            response_code,
            error: true,
        }
    }

    pub fn not_found(method: &str) -> Self {
        Self::new(format!("No such method: {method}"), 404)
    }
}

/// The presence record returned for a `no_exec` probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceRecord {
    pub found: bool,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// A fully decoded reply, as consumed by gateways.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Reply {
    /// Result of a `no_exec` probe.
    Presence(PresenceRecord),
    /// A structured error.
    Error { error: ErrorRecord },
    /// Any other JSON value — the successful result of an invocation. Must
    /// be the last variant tried by `#[serde(untagged)]`, since it matches
    /// anything.
    Value(Value),
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Reply::Value(value)
    }

    pub fn error(record: ErrorRecord) -> Self {
        Reply::Error { error: record }
    }

    pub fn presence(reference: impl Into<String>) -> Self {
        Reply::Presence(PresenceRecord {
            found: true,
            reference: reference.into(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("reply always serializes")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The HTTP-ish status code this reply implies, for gateways that need
    /// to set an outer status (the REST gateway; `supress_response_codes`
    /// folds this back into the body instead).
    pub fn status_code(&self) -> u16 {
        match self {
            Reply::Error { error } => error.response_code,
            _ => 200,
        }
    }
}
