//! `LOOKUP` (procedure 3, RFC 1813 section 3.3.3): one path component to a
//! file handle.
//!
//! Paths never travel to the server whole. A probe walks them from the
//! export root, one LOOKUP per component, and keeps the attributes of the
//! last hop so GETATTR is often unnecessary.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_LOOKUP` for `name` inside `dir`.
///
/// # Returns
///
/// * `Ok(LOOKUP3resok)` - handle and attributes of the object found
/// * `Err(ProcError::Nfs(NFS3ERR_NOENT))` - no such name in the directory
pub async fn nfsproc3_lookup(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    name: &str,
) -> Result<nfs3::LOOKUP3resok, ProcError> {
    let args = nfs3::diropargs3 {
        dir: dir.clone(),
        name: name.to_string(),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_LOOKUP, &args)
        .await;
    let res = match payload.map_err(ProcError::from).and_then(nfs_result) {
        Ok(mut src) => decode::<nfs3::LOOKUP3resok>(&mut src)?,
        Err(e) => {
            debug!("nfsproc3_lookup({},{:?}) --> {}", dir, name, e);
            return Err(e);
        }
    };
    debug!("nfsproc3_lookup({},{:?}) --> {}", dir, name, res.object);
    Ok(res)
}
