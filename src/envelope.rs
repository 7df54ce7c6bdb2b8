//! The uniform result shape of every operation.
//!
//! An [`Envelope`] always carries `success`; failures add `error`; everything
//! else an operation reports is flattened beside them. A [`Response`] pairs
//! the envelope with the HTTP-style status the caller should see:
//!
//! | outcome                                   | status | success |
//! |-------------------------------------------|--------|---------|
//! | operation completed                       | 200    | true    |
//! | transport or protocol failure             | 200    | false   |
//! | invalid input                             | 400    | false   |
//! | destination blocked                       | 403    | false   |
//! | write operation without POST              | 405    | false   |
//! | defect in the engine                      | 500    | false   |

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::rpc::RpcError;
use crate::session::TransportError;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    pub fn ok() -> Envelope {
        Envelope {
            success: true,
            error: None,
            fields: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Envelope {
        Envelope {
            success: false,
            error: Some(error.into()),
            fields: Map::new(),
        }
    }

    /// Adds a field. `success` and `error` are reserved and ignored here.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Envelope {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        if key != "success" && key != "error" {
            self.fields.insert(key.to_string(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Envelope,
}

impl Response {
    pub fn ok(body: Envelope) -> Response {
        Response { status: 200, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Why an operation did not produce a successful envelope.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Validation(String),

    #[error("Destination {host} is a protected Cloudflare address and cannot be probed")]
    Blocked { host: String },

    #[error("Method {method} not allowed for {operation}; use POST")]
    MethodNotAllowed { method: String, operation: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(RpcError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    pub fn validation(message: impl Into<String>) -> ProbeError {
        ProbeError::Validation(message.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            ProbeError::Validation(_) => 400,
            ProbeError::Blocked { .. } => 403,
            ProbeError::MethodNotAllowed { .. } => 405,
            ProbeError::Transport(_) | ProbeError::Protocol(_) => 200,
            ProbeError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Envelope::failure(self.to_string());
        if let ProbeError::Blocked { .. } = self {
            body.insert("isCloudflare", true);
        }
        Response { status, body }
    }
}

impl From<RpcError> for ProbeError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(e) => ProbeError::Transport(e),
            RpcError::Encode(e) => ProbeError::Internal(format!("failed to encode call: {e}")),
            other => ProbeError::Protocol(other),
        }
    }
}
