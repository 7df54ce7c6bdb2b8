//! ONC-RPC version 2 client transport as specified in RFC 5531 (previously RFC 1057).
//!
//! The RPC layer turns a [`Session`](crate::session::Session) into a
//! request/response channel for a single program. It is responsible for:
//!
//! 1. Record marking over TCP (`wire`)
//! 2. Transaction id allocation and reply correlation (`transaction_tracker`)
//! 3. Call header construction with `AUTH_NULL` or `AUTH_UNIX` credentials
//! 4. Mapping of accepted/denied reply status to [`RpcError`] (`client`)
//!
//! Exactly one call is outstanding per client at a time. Procedure results
//! are returned undecoded; the procedure modules under
//! [`crate::protocol::nfs`] know how to read them.

use std::io;

use thiserror::Error;

use crate::protocol::xdr::rpc::{auth_stat, auth_unix, opaque_auth};
use crate::session::TransportError;

mod client;
mod transaction_tracker;
pub mod wire;

pub use client::{check_reply, RpcClient};
pub use transaction_tracker::TransactionTracker;

/// Largest reply record accepted unless configured otherwise.
pub const DEFAULT_MAX_RECORD_LENGTH: usize = 4 * 1024 * 1024;

/// Everything that can go wrong between sending a call and holding its result.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Reply xid {received:#010x} does not match call xid {expected:#010x}")]
    XidMismatch { expected: u32, received: u32 },

    #[error("Expected an RPC reply but received a call (xid {xid:#010x})")]
    NotAReply { xid: u32 },

    #[error("Program {prog} unavailable")]
    ProgUnavail { prog: u32 },

    #[error("Program {prog} version {vers} not supported (server supports {low}-{high})")]
    ProgMismatch {
        prog: u32,
        vers: u32,
        low: u32,
        high: u32,
    },

    #[error("Procedure {proc} unavailable")]
    ProcUnavail { proc: u32 },

    #[error("Server could not decode call arguments")]
    GarbageArgs,

    #[error("Server system error")]
    SystemErr,

    #[error("RPC version mismatch (server supports {low}-{high})")]
    RpcMismatch { low: u32, high: u32 },

    #[error("Authentication rejected: {0}")]
    AuthError(auth_stat),

    #[error("RPC record of {length} bytes exceeds limit of {limit}")]
    RecordTooLarge { length: usize, limit: usize },

    #[error("Malformed reply: {0}")]
    Decode(#[source] io::Error),

    #[error("Failed to encode call: {0}")]
    Encode(#[source] io::Error),
}

/// The credential attached to every call of a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    /// `AUTH_NULL`
    None,
    /// `AUTH_UNIX` with the given identity
    Unix(auth_unix),
}

impl Credential {
    /// An `AUTH_UNIX` credential with a zero timestamp.
    pub fn unix(machine_name: &str, uid: u32, gid: u32, gids: Vec<u32>) -> Credential {
        Credential::Unix(auth_unix {
            stamp: 0,
            machinename: machine_name.to_string(),
            uid,
            gid,
            gids,
        })
    }

    /// Encodes the credential as it appears in a call header.
    pub fn to_opaque_auth(&self) -> Result<opaque_auth, RpcError> {
        match self {
            Credential::None => Ok(opaque_auth::default()),
            Credential::Unix(auth) => opaque_auth::unix(auth).map_err(RpcError::Encode),
        }
    }
}
