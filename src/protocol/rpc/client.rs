//! Synchronous request/response RPC calls over a [`Session`].
//!
//! A call goes out as one record: the `rpc_msg` call header followed by the
//! XDR-encoded procedure arguments. The client then waits for exactly one
//! reply record and inspects it in order:
//!
//! 1. the reply xid must equal the call xid,
//! 2. the message must be a REPLY,
//! 3. a `MSG_DENIED` reply becomes an RPC or authentication error,
//! 4. an accepted reply with any status other than `SUCCESS` becomes the
//!    matching error.
//!
//! What remains after a `SUCCESS` header is the procedure-specific result,
//! handed back undecoded to the procedure that issued the call.

use std::io::Cursor;

use tracing::{debug, trace};

use crate::protocol::rpc::{wire, RpcError, TransactionTracker, DEFAULT_MAX_RECORD_LENGTH};
use crate::protocol::xdr::rpc::{
    accept_body, call_message, opaque_auth, rejected_reply, reply_body, rpc_body, rpc_msg,
};
use crate::protocol::xdr::{deserialize, Serialize};
use crate::session::Session;

/// An RPC client bound to one session and one credential.
pub struct RpcClient<'a> {
    session: &'a mut Session,
    cred: opaque_auth,
    tracker: &'a TransactionTracker,
    max_record_length: usize,
}

impl<'a> RpcClient<'a> {
    pub fn new(session: &'a mut Session, cred: opaque_auth) -> RpcClient<'a> {
        RpcClient {
            session,
            cred,
            tracker: TransactionTracker::global(),
            max_record_length: DEFAULT_MAX_RECORD_LENGTH,
        }
    }

    pub fn with_max_record_length(mut self, max_record_length: usize) -> Self {
        self.max_record_length = max_record_length;
        self
    }

    pub fn with_tracker(mut self, tracker: &'a TransactionTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    /// Issues a call and returns the undecoded procedure result.
    pub async fn call<A: Serialize + ?Sized>(
        &mut self,
        prog: u32,
        vers: u32,
        proc: impl Into<u32>,
        args: &A,
    ) -> Result<Vec<u8>, RpcError> {
        let proc = proc.into();
        let xid = self.tracker.next_xid();
        let header = call_message(xid, prog, vers, proc, self.cred.clone(), opaque_auth::default());

        let mut buf = Vec::new();
        header.serialize(&mut buf).map_err(RpcError::Encode)?;
        args.serialize(&mut buf).map_err(RpcError::Encode)?;
        debug!("rpc call xid {:#010x} prog {} vers {} proc {}", xid, prog, vers, proc);
        wire::write_record(self.session, &buf).await?;

        let record = wire::read_record(self.session, self.max_record_length).await?;
        trace!("rpc reply xid {:#010x} ({} bytes)", xid, record.len());
        let offset = check_reply(self.tracker, xid, prog, vers, proc, &record)?;
        Ok(record[offset..].to_vec())
    }

    /// Issues a call with no arguments and discards the (void) result.
    pub async fn call_void(
        &mut self,
        prog: u32,
        vers: u32,
        proc: impl Into<u32>,
    ) -> Result<(), RpcError> {
        self.call(prog, vers, proc, &()).await.map(|_| ())
    }
}

/// Validates a reply header and returns the offset at which the result starts.
pub fn check_reply(
    tracker: &TransactionTracker,
    xid: u32,
    prog: u32,
    vers: u32,
    proc: u32,
    record: &[u8],
) -> Result<usize, RpcError> {
    let mut cursor = Cursor::new(record);
    let reply = deserialize::<rpc_msg>(&mut cursor).map_err(RpcError::Decode)?;
    tracker.verify(xid, reply.xid)?;
    let body = match reply.body {
        rpc_body::REPLY(body) => body,
        rpc_body::CALL(_) => return Err(RpcError::NotAReply { xid: reply.xid }),
    };
    match body {
        reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(info)) => Err(RpcError::RpcMismatch {
            low: info.low,
            high: info.high,
        }),
        reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat)) => Err(RpcError::AuthError(stat)),
        reply_body::MSG_ACCEPTED(accepted) => match accepted.reply_data {
            accept_body::SUCCESS => Ok(cursor.position() as usize),
            accept_body::PROG_UNAVAIL => Err(RpcError::ProgUnavail { prog }),
            accept_body::PROG_MISMATCH(info) => Err(RpcError::ProgMismatch {
                prog,
                vers,
                low: info.low,
                high: info.high,
            }),
            accept_body::PROC_UNAVAIL => Err(RpcError::ProcUnavail { proc }),
            accept_body::GARBAGE_ARGS => Err(RpcError::GarbageArgs),
            accept_body::SYSTEM_ERR => Err(RpcError::SystemErr),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::xdr::rpc::{
        auth_error_reply, auth_stat, prog_mismatch_reply, success_reply,
    };
    use crate::protocol::xdr::to_bytes;

    #[test]
    fn success_reply_yields_result_offset() {
        let tracker = TransactionTracker::starting_at(0);
        let mut record = to_bytes(&success_reply(42)).unwrap();
        let header_len = record.len();
        record.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(check_reply(&tracker, 42, 100003, 3, 0, &record).unwrap(), header_len);
    }

    #[test]
    fn prog_mismatch_carries_range() {
        let tracker = TransactionTracker::starting_at(0);
        let record = to_bytes(&prog_mismatch_reply(9, 2, 3)).unwrap();
        match check_reply(&tracker, 9, 100003, 4, 0, &record) {
            Err(RpcError::ProgMismatch {
                vers: 4,
                low: 2,
                high: 3,
                ..
            }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn denied_reply_is_auth_error() {
        let tracker = TransactionTracker::starting_at(0);
        let record = to_bytes(&auth_error_reply(5, auth_stat::AUTH_TOOWEAK)).unwrap();
        assert!(matches!(
            check_reply(&tracker, 5, 100005, 3, 1, &record),
            Err(RpcError::AuthError(auth_stat::AUTH_TOOWEAK))
        ));
    }

    #[test]
    fn gss_denials_are_auth_errors() {
        let tracker = TransactionTracker::starting_at(0);
        for (code, stat) in [
            (13u8, auth_stat::RPCSEC_GSS_CREDPROBLEM),
            (14u8, auth_stat::RPCSEC_GSS_CTXPROBLEM),
        ] {
            let mut record = to_bytes(&auth_error_reply(6, auth_stat::AUTH_BADCRED)).unwrap();
            let last = record.len() - 1;
            record[last] = code;
            match check_reply(&tracker, 6, 100003, 3, 1, &record) {
                Err(RpcError::AuthError(got)) => assert_eq!(got, stat),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
