use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope of everything the dispatcher puts on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    Request {
        id: u64,
        name: String,
        #[serde(default)]
        params: Value,
    },
    Response {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Message {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Packet {
    pub fn response(id: u64, outcome: Result<Value, String>) -> Self {
        match outcome {
            Ok(result) => Self::Response {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self::Response {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// A response carrying neither field resolved to `null`.
pub(crate) fn outcome(result: Option<Value>, error: Option<String>) -> Result<Value, String> {
    match error {
        Some(e) => Err(e),
        None => Ok(result.unwrap_or(Value::Null)),
    }
}
