//! Transaction identifiers for outgoing RPC calls (RFC 5531 section 9).
//!
//! The xid is the only thing that ties a reply to its call. Identifiers are
//! drawn from a process-wide counter seeded with a random value, so two probes
//! never share an xid and a reply left over from an earlier connection is not
//! mistaken for the answer to a new call.

use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use tracing::warn;

use crate::protocol::rpc::RpcError;

static GLOBAL: Lazy<TransactionTracker> = Lazy::new(TransactionTracker::new);

/// Issues transaction ids and checks replies against them.
#[derive(Debug)]
pub struct TransactionTracker {
    next: AtomicU32,
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTracker {
    /// Creates a tracker starting at a random xid.
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    /// Creates a tracker whose first xid is `xid`.
    pub fn starting_at(xid: u32) -> Self {
        Self {
            next: AtomicU32::new(xid),
        }
    }

    /// The process-wide tracker used by [`super::RpcClient`] unless told otherwise.
    pub fn global() -> &'static TransactionTracker {
        &GLOBAL
    }

    /// Returns a fresh xid. Wraps around after `u32::MAX`.
    pub fn next_xid(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Checks that a reply belongs to the outstanding call.
    pub fn verify(&self, expected: u32, received: u32) -> Result<(), RpcError> {
        if expected != received {
            warn!("Reply xid {:#010x} does not match call xid {:#010x}", received, expected);
            return Err(RpcError::XidMismatch { expected, received });
        }
        Ok(())
    }
}
