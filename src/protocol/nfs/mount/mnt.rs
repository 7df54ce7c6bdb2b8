//! Implementation of the MNT procedure (procedure 1) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.2.
//!
//! MNT maps an exported directory path to the file handle of its root. The
//! handle is the starting point of every NFS path walk; the list of
//! authentication flavors tells the client which credentials the export takes.

use tracing::debug;

use crate::protocol::nfs::{decode, mount_result, ProcError};
use crate::protocol::rpc::{RpcClient, RpcError};
use crate::protocol::xdr::{invalid_data, mount};

/// Issues `MOUNTPROC3_MNT` for `path`.
///
/// # Returns
///
/// * `Ok(mountres3_ok)` - root handle and accepted auth flavors
/// * `Err(ProcError::Mount(_))` - the server refused the mount
pub async fn mountproc3_mnt(
    client: &mut RpcClient<'_>,
    path: &str,
) -> Result<mount::mountres3_ok, ProcError> {
    debug!("mountproc3_mnt({:?})", path);
    let payload = client
        .call(mount::PROGRAM, mount::VERSION, mount::MountProgram::MOUNTPROC3_MNT, path)
        .await?;
    let mut src = mount_result(payload)?;
    let res = decode::<mount::mountres3_ok>(&mut src)?;
    if res.fhandle.len() > mount::FHSIZE3 {
        return Err(RpcError::Decode(invalid_data("mount handle exceeds FHSIZE3")).into());
    }
    debug!("mountproc3_mnt({:?}) --> {} byte handle", path, res.fhandle.len());
    Ok(res)
}
