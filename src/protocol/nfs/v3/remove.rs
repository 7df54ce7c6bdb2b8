//! Implementation of the `REMOVE` procedure (procedure 12) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.12.
//!
//! REMOVE deletes a non-directory entry. Servers answer `NFS3ERR_ISDIR` (or
//! sometimes `NFS3ERR_NOTDIR`) when the name refers to a directory.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_REMOVE` for `name` inside `dir`.
pub async fn nfsproc3_remove(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    name: &str,
) -> Result<nfs3::REMOVE3resok, ProcError> {
    debug!("nfsproc3_remove({},{:?})", dir, name);
    let args = nfs3::diropargs3 {
        dir: dir.clone(),
        name: name.to_string(),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_REMOVE, &args)
        .await?;
    decode::<nfs3::REMOVE3resok>(&mut nfs_result(payload)?)
}
