//! Implementation of the `RMDIR` procedure (procedure 13) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.13.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_RMDIR` for `name` inside `dir`. The directory must be empty.
pub async fn nfsproc3_rmdir(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    name: &str,
) -> Result<nfs3::REMOVE3resok, ProcError> {
    debug!("nfsproc3_rmdir({},{:?})", dir, name);
    let args = nfs3::diropargs3 {
        dir: dir.clone(),
        name: name.to_string(),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_RMDIR, &args)
        .await?;
    decode::<nfs3::REMOVE3resok>(&mut nfs_result(payload)?)
}
