//! Wire envelope shapes for the command-monitor protocol.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound `{ "Command": "<name>", ...arbitrary fields }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(rename = "Command")]
    pub command: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Outbound `{ "Status": int, "StatusMessage": string, ...handler fields }`.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(rename = "Status")]
    pub status: i32,
    #[serde(rename = "StatusMessage")]
    pub status_message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    pub fn ok(fields: Map<String, Value>) -> Self {
        Self {
            status: 0,
            status_message: String::new(),
            fields,
        }
    }

    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            status_message: message.into(),
            fields: Map::new(),
        }
    }

    /// Literal fallback emitted when `Response` itself fails to marshal.
    pub fn internal_marshal_error_json() -> &'static str {
        r#"{"Status":106,"StatusMessage":"internalError"}"#
    }
}
