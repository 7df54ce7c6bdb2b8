//! NFS protocol client procedures.
//!
//! This module provides the two programs a probe speaks:
//!
//! - `mount`: The MOUNT protocol (RFC 1813 Appendix I). It lists exports and
//!   turns an export path into the root file handle every NFS call starts from.
//!
//! - `v3`: The NFS version 3 protocol (RFC 1813). Each procedure lives in its
//!   own file and issues exactly one call through an
//!   [`RpcClient`](crate::protocol::rpc::RpcClient).
//!
//! Procedures distinguish three outcomes: the call never produced a result
//! ([`ProcError::Rpc`]), the server answered with a non-OK status
//! ([`ProcError::Nfs`] / [`ProcError::Mount`]), or the typed success result.

use std::io::{Cursor, Read};

use thiserror::Error;

use crate::protocol::rpc::RpcError;
use crate::protocol::xdr::mount::mountstat3;
use crate::protocol::xdr::nfs3::nfsstat3;
use crate::protocol::xdr::{deserialize, Deserialize};

pub mod mount;
pub mod v3;

/// Failure of a single procedure call.
#[derive(Debug, Error)]
pub enum ProcError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("{0}")]
    Nfs(nfsstat3),

    #[error("{0}")]
    Mount(mountstat3),
}

/// Decodes the next value of a procedure result.
pub(crate) fn decode<T: Deserialize + Default>(src: &mut impl Read) -> Result<T, ProcError> {
    deserialize::<T>(src).map_err(|e| ProcError::Rpc(RpcError::Decode(e)))
}

/// Reads the leading `nfsstat3` of an NFS result, failing on anything but `NFS3_OK`.
pub(crate) fn nfs_result(payload: Vec<u8>) -> Result<Cursor<Vec<u8>>, ProcError> {
    let mut src = Cursor::new(payload);
    match decode::<nfsstat3>(&mut src)? {
        nfsstat3::NFS3_OK => Ok(src),
        stat => Err(ProcError::Nfs(stat)),
    }
}

/// Reads the leading `mountstat3` of a MOUNT result, failing on anything but `MNT3_OK`.
pub(crate) fn mount_result(payload: Vec<u8>) -> Result<Cursor<Vec<u8>>, ProcError> {
    let mut src = Cursor::new(payload);
    match decode::<mountstat3>(&mut src)? {
        mountstat3::MNT3_OK => Ok(src),
        stat => Err(ProcError::Mount(stat)),
    }
}
