//! Envelope codec — the wire format shared by every gateway and the worker.
//!
//! An envelope is a JSON object naming a dotted `method` path plus positional
//! `args` and keyword `kwargs`. The worker rejects anything that isn't a JSON
//! object or that lacks a string `method`; unknown top-level keys are ignored.

use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded request envelope, ready for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub reply_channel: Option<String>,
    pub no_exec: bool,
}

/// Failure to decode a dequeued envelope. The worker logs these and drops
/// the envelope, per the error handling policy.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("missing or non-string `method`")]
    MissingMethod,
}

impl Envelope {
    /// Build an envelope for a real invocation.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            reply_channel: None,
            no_exec: false,
        }
    }

    /// Build a `no_exec` presence-probe envelope, as used by the REST
    /// gateway's resource-discovery walk.
    pub fn probe(method: impl Into<String>) -> Self {
        Self {
            no_exec: true,
            ..Self::new(method)
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_reply_channel(mut self, channel: impl Into<String>) -> Self {
        self.reply_channel = Some(channel.into());
        self
    }

    /// Decode a dequeued envelope from its UTF-8 JSON bytes, applying the
    /// shape rules from the wire contract: must be an object, must carry a
    /// string `method`; `args`/`kwargs` default to empty; everything else
    /// is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Same as [`decode`](Self::decode) but starting from an already-parsed
    /// [`Value`] — used when a gateway has already parsed a POST/WS body and
    /// wants to reuse the same validation rules.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut obj) = value else {
            return Err(EnvelopeError::NotAnObject(json_type_name(&value)));
        };
        let method = match obj.remove("method") {
            Some(Value::String(s)) => s,
            _ => return Err(EnvelopeError::MissingMethod),
        };
        let args = match obj.remove("args") {
            Some(Value::Array(items)) => items,
            Some(_) | None => Vec::new(),
        };
        let kwargs = match obj.remove("kwargs") {
            Some(Value::Object(map)) => map,
            Some(_) | None => Map::new(),
        };
        let reply_channel = match obj.remove("reply_channel") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let no_exec = matches!(obj.remove("no_exec"), Some(Value::Bool(true)));
        Ok(Envelope {
            method,
            args,
            kwargs,
            reply_channel,
            no_exec,
        })
    }

    /// Encode this envelope back to a JSON [`Value`] for pushing onto the
    /// work queue.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("method".into(), Value::String(self.method.clone()));
        obj.insert("args".into(), Value::Array(self.args.clone()));
        obj.insert(
            "kwargs".into(),
            Value::Object(self.kwargs.clone()),
        );
        if let Some(channel) = &self.reply_channel {
            obj.insert("reply_channel".into(), Value::String(channel.clone()));
        }
        if self.no_exec {
            obj.insert("no_exec".into(), Value::Bool(true));
        }
        Value::Object(obj)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Safe: Envelope only ever contains already-valid JSON values.
        serde_json::to_vec(&self.to_value()).expect("envelope always serializes")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minimal_envelope() {
        let bytes = serde_json::to_vec(&json!({"method": "Calculator.add"})).unwrap();
        let env = Envelope::decode(&bytes).unwrap();
        assert_eq!(env.method, "Calculator.add");
        assert!(env.args.is_empty());
        assert!(env.kwargs.is_empty());
        assert!(!env.no_exec);
    }

    #[test]
    fn decodes_full_envelope() {
        let bytes = serde_json::to_vec(&json!({
            "method": "Calculator.add",
            "args": [2, 3],
            "kwargs": {"round": true},
            "reply_channel": "bc_abc123",
            "no_exec": true,
        }))
        .unwrap();
        let env = Envelope::decode(&bytes).unwrap();
        assert_eq!(env.args, vec![json!(2), json!(3)]);
        assert_eq!(env.kwargs.get("round"), Some(&json!(true)));
        assert_eq!(env.reply_channel.as_deref(), Some("bc_abc123"));
        assert!(env.no_exec);
    }

    #[test]
    fn rejects_non_object() {
        let bytes = serde_json::to_vec(&json!([1, 2, 3])).unwrap();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(EnvelopeError::NotAnObject("array"))
        ));
    }

    #[test]
    fn rejects_missing_method() {
        let bytes = serde_json::to_vec(&json!({"args": []})).unwrap();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(EnvelopeError::MissingMethod)
        ));
    }

    #[test]
    fn rejects_non_string_method() {
        let bytes = serde_json::to_vec(&json!({"method": 5})).unwrap();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(EnvelopeError::MissingMethod)
        ));
    }

    #[test]
    fn ignores_unknown_keys() {
        let bytes = serde_json::to_vec(&json!({"method": "f", "extra": "ignored"})).unwrap();
        assert!(Envelope::decode(&bytes).is_ok());
    }

    #[test]
    fn round_trips_through_to_value() {
        let env = Envelope::new("Calculator.add")
            .with_args(vec![json!(2), json!(3)])
            .with_reply_channel("bc_xyz");
        let decoded = Envelope::from_value(env.to_value()).unwrap();
        assert_eq!(decoded, env);
    }
}
