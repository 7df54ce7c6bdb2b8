//! Implementation of the EXPORT procedure (procedure 5) for `MOUNT` protocol
//! as defined in RFC 1813 section 5.2.5.
//! <https://datatracker.ietf.org/doc/html/rfc1813#section-5.2.5>.

use tracing::debug;

use crate::protocol::nfs::{decode, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::mount;

/// Issues `MOUNTPROC_EXPORT` at the given program version.
///
/// Returns every exported file system together with the groups allowed
/// to mount it. An empty group list means the export is open to all clients.
pub async fn mountproc3_export(
    client: &mut RpcClient<'_>,
    version: u32,
) -> Result<Vec<mount::exportnode>, ProcError> {
    let payload = client
        .call(mount::PROGRAM, version, mount::MountProgram::MOUNTPROC3_EXPORT, &())
        .await?;
    let exports = decode::<mount::exports>(&mut payload.as_slice())?;
    debug!("mountproc3_export(v{}) --> {} exports", version, exports.0.len());
    Ok(exports.0)
}
