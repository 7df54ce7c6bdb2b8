//! Implementation of the `WRITE` procedure (procedure 7) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.7.
//!
//! The server reports how many bytes it wrote and how durably it committed
//! them; both may be less than what was asked for.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::nfs3::file::stable_how;

/// Issues `NFSPROC3_WRITE` of `data` at `offset`.
pub async fn nfsproc3_write(
    client: &mut RpcClient<'_>,
    file: &nfs3::nfs_fh3,
    offset: nfs3::offset3,
    stable: stable_how,
    data: &[u8],
) -> Result<nfs3::file::WRITE3resok, ProcError> {
    let args = nfs3::file::WRITE3args {
        file: file.clone(),
        offset,
        count: data.len() as nfs3::count3,
        stable,
        data: data.to_vec(),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_WRITE, &args)
        .await?;
    let res = decode::<nfs3::file::WRITE3resok>(&mut nfs_result(payload)?)?;
    debug!(
        "nfsproc3_write({},{},{}) --> {} bytes {}",
        file,
        offset,
        data.len(),
        res.count,
        res.committed
    );
    Ok(res)
}
