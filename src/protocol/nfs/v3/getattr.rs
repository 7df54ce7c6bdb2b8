//! Implementation of the `GETATTR` procedure (procedure 1) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.1.
//!
//! `GETATTR` retrieves the attributes for a specified file system object.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_GETATTR` for `object`.
pub async fn nfsproc3_getattr(
    client: &mut RpcClient<'_>,
    object: &nfs3::nfs_fh3,
) -> Result<nfs3::fattr3, ProcError> {
    debug!("nfsproc3_getattr({})", object);
    let args = nfs3::GETATTR3args {
        object: object.clone(),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_GETATTR, &args)
        .await?;
    let res = decode::<nfs3::GETATTR3resok>(&mut nfs_result(payload)?)?;
    Ok(res.obj_attributes)
}
