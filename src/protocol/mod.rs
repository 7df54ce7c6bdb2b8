//! Protocol module implements the client side of the NFS version 3 protocol suite
//! as specified in RFC 1813.
//!
//! This module contains three main components:
//!
//! - `xdr`: External Data Representation (XDR) for serialization and deserialization
//!   of data structures according to RFC 4506.
//!
//! - `rpc`: Remote Procedure Call (RPC) version 2 client transport as defined in
//!   RFC 5531: record marking, transaction ids and reply status handling.
//!
//! - `nfs`: The MOUNT and NFSv3 procedures issued by a probe, one function per
//!   procedure, each making exactly one call.
//!
//! NFS is stateless: every operation names its object by an opaque file handle
//! obtained from MOUNT and refined with LOOKUP, never by path.

pub mod nfs;
pub mod rpc;
pub mod xdr;
