//! Implementation of the NULL procedure (procedure 0) for NFS protocol
//! as defined in RFC 1813 section 3.3.0.
//!
//! The NULL procedure does no work and is typically used to:
//! - Check if the server is responding (ping)
//! - Measure basic RPC round-trip time
//! - Discover which program versions a server speaks
//!
//! NULL takes no arguments and returns no results, just an RPC response indicating success.

use tracing::debug;

use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC_NULL` at the given program version.
///
/// Version 4 servers answer NULL too, so this is the one procedure that is
/// meaningful outside version 3.
pub async fn nfsproc3_null(client: &mut RpcClient<'_>, version: u32) -> Result<(), ProcError> {
    debug!("nfsproc3_null(v{})", version);
    client.call_void(nfs3::PROGRAM, version, nfs3::NFSProgram::NFSPROC3_NULL).await?;
    Ok(())
}
