//! Implementation of the NULL procedure (procedure 0) for MOUNT protocol
//! as defined in RFC 1813 section 5.2.0
//! https://datatracker.ietf.org/doc/html/rfc1813#section-5.2.0

use tracing::debug;

use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::mount;

/// Issues `MOUNTPROC_NULL` at the given program version.
///
/// Procedure NULL does not do any work. It is made available
/// to allow server response testing and timing.
pub async fn mountproc3_null(client: &mut RpcClient<'_>, version: u32) -> Result<(), ProcError> {
    debug!("mountproc3_null(v{})", version);
    client
        .call_void(mount::PROGRAM, version, mount::MountProgram::MOUNTPROC3_NULL)
        .await?;
    Ok(())
}
