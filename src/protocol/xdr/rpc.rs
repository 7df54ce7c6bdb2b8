//! ONC-RPC message layout (RFC 5531 section 9).
//!
//! netprobe only ever sends CALL messages and reads REPLY messages; the reply
//! builders at the bottom exist so tests and mock servers can speak the
//! other side of the conversation.

// Type names follow the RFC.
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// RPC protocol version carried in every call.
pub const RPC_VERSION: u32 = 2;

/// Why the server refused our credential (`MSG_DENIED` / `AUTH_ERROR`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    AUTH_OK = 0,
    #[default]
    AUTH_BADCRED = 1,
    AUTH_REJECTEDCRED = 2,
    AUTH_BADVERF = 3,
    AUTH_REJECTEDVERF = 4,
    AUTH_TOOWEAK = 5,
    AUTH_INVALIDRESP = 6,
    AUTH_FAILED = 7,
    AUTH_KERB_GENERIC = 8,
    AUTH_TIMEEXPIRE = 9,
    AUTH_TKT_FILE = 10,
    AUTH_DECODE = 11,
    AUTH_NET_ADDR = 12,
    RPCSEC_GSS_CREDPROBLEM = 13,
    RPCSEC_GSS_CTXPROBLEM = 14,
}
impl SerializeEnum for auth_stat {}
impl DeserializeEnum for auth_stat {}

impl fmt::Display for auth_stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            auth_stat::AUTH_OK => "ok",
            auth_stat::AUTH_BADCRED => "bad credential",
            auth_stat::AUTH_REJECTEDCRED => "credential rejected",
            auth_stat::AUTH_BADVERF => "bad verifier",
            auth_stat::AUTH_REJECTEDVERF => "verifier rejected",
            auth_stat::AUTH_TOOWEAK => "authentication too weak",
            auth_stat::AUTH_INVALIDRESP => "invalid response verifier",
            auth_stat::AUTH_FAILED => "authentication failed",
            auth_stat::AUTH_KERB_GENERIC => "kerberos error",
            auth_stat::AUTH_TIMEEXPIRE => "credential expired",
            auth_stat::AUTH_TKT_FILE => "bad ticket file",
            auth_stat::AUTH_DECODE => "cannot decode authenticator",
            auth_stat::AUTH_NET_ADDR => "wrong network address in ticket",
            auth_stat::RPCSEC_GSS_CREDPROBLEM => "GSS credential problem",
            auth_stat::RPCSEC_GSS_CTXPROBLEM => "GSS context problem",
        })
    }
}

/// Credential flavors. Only `AUTH_NULL` and `AUTH_UNIX` are ever sent; the
/// rest are listed so a server's verifier still decodes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_flavor {
    #[default]
    AUTH_NULL = 0,
    AUTH_UNIX = 1,
    AUTH_SHORT = 2,
    AUTH_DES = 3,
    RPCSEC_GSS = 6,
}
impl SerializeEnum for auth_flavor {}
impl DeserializeEnum for auth_flavor {}

/// Body of an `AUTH_UNIX` credential.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_unix {
    pub stamp: u32,
    pub machinename: String,
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups; servers accept at most 16.
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// A credential or verifier: a flavor and a flavor-specific body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct opaque_auth {
    pub flavor: auth_flavor,
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

impl opaque_auth {
    /// Wraps an encoded `auth_unix` body as an `AUTH_UNIX` credential.
    pub fn unix(auth: &auth_unix) -> std::io::Result<opaque_auth> {
        Ok(opaque_auth {
            flavor: auth_flavor::AUTH_UNIX,
            body: to_bytes(auth)?,
        })
    }
}

/// One RPC message. A reply echoes the xid of the call it answers.
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    pub xid: u32,
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
pub enum rpc_body {
    CALL(call_body),
    REPLY(reply_body),
}
XdrUnion!(rpc_body {
    0 => CALL(call_body),
    1 => REPLY(reply_body),
});

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

/// Call header. The procedure arguments follow `verf` on the wire.
#[derive(Clone, Debug, Default)]
pub struct call_body {
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth,
    pub verf: opaque_auth,
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

#[derive(Clone, Debug)]
pub enum reply_body {
    MSG_ACCEPTED(accepted_reply),
    MSG_DENIED(rejected_reply),
}
XdrUnion!(reply_body {
    0 => MSG_ACCEPTED(accepted_reply),
    1 => MSG_DENIED(rejected_reply),
});

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

/// Inclusive range of versions the server does support.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// The server understood the call; `reply_data` says whether it ran it.
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    pub verf: opaque_auth,
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// `accept_stat` with its arm data. Only `SUCCESS` is followed by a
/// procedure result.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default)]
pub enum accept_body {
    #[default]
    SUCCESS,
    PROG_UNAVAIL,
    PROG_MISMATCH(mismatch_info),
    PROC_UNAVAIL,
    GARBAGE_ARGS,
    SYSTEM_ERR,
}
XdrUnion!(accept_body {
    void: [0 => SUCCESS, 1 => PROG_UNAVAIL, 3 => PROC_UNAVAIL, 4 => GARBAGE_ARGS, 5 => SYSTEM_ERR],
    data: [2 => PROG_MISMATCH(mismatch_info)],
});

/// The server refused the call before looking at the program.
#[derive(Clone, Debug)]
pub enum rejected_reply {
    RPC_MISMATCH(mismatch_info),
    AUTH_ERROR(auth_stat),
}
XdrUnion!(rejected_reply {
    0 => RPC_MISMATCH(mismatch_info),
    1 => AUTH_ERROR(auth_stat),
});

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

/// Call header for `prog`/`vers`/`proc`; the arguments are appended by the caller.
pub fn call_message(
    xid: u32,
    prog: u32,
    vers: u32,
    proc: u32,
    cred: opaque_auth,
    verf: opaque_auth,
) -> rpc_msg {
    let call = call_body {
        rpcvers: RPC_VERSION,
        prog,
        vers,
        proc,
        cred,
        verf,
    };
    rpc_msg {
        xid,
        body: rpc_body::CALL(call),
    }
}

pub fn accepted_reply_with(xid: u32, reply_data: accept_body) -> rpc_msg {
    let accepted = accepted_reply {
        verf: opaque_auth::default(),
        reply_data,
    };
    rpc_msg {
        xid,
        body: rpc_body::REPLY(reply_body::MSG_ACCEPTED(accepted)),
    }
}

pub fn success_reply(xid: u32) -> rpc_msg {
    accepted_reply_with(xid, accept_body::SUCCESS)
}

pub fn prog_mismatch_reply(xid: u32, low: u32, high: u32) -> rpc_msg {
    accepted_reply_with(xid, accept_body::PROG_MISMATCH(mismatch_info { low, high }))
}

pub fn auth_error_reply(xid: u32, stat: auth_stat) -> rpc_msg {
    rpc_msg {
        xid,
        body: rpc_body::REPLY(reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat))),
    }
}
