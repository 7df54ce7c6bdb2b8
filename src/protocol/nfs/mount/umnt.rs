//! Implementation of the UMNT procedure (procedure 3) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.4.
//!
//! UMNT removes the server's record of a mount. The server's mount list is
//! advisory only, so a failed UMNT never affects the outcome of a probe.

use tracing::debug;

use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::mount;

/// Issues `MOUNTPROC3_UMNT` for `path`. The reply is void.
pub async fn mountproc3_umnt(client: &mut RpcClient<'_>, path: &str) -> Result<(), ProcError> {
    debug!("mountproc3_umnt({:?})", path);
    client
        .call(mount::PROGRAM, mount::VERSION, mount::MountProgram::MOUNTPROC3_UMNT, path)
        .await?;
    Ok(())
}
