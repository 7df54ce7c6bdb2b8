//! Implementation of the `READ` procedure (procedure 6) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.6.
//!
//! `READ` returns up to `count` bytes starting at `offset`. Servers may return
//! fewer bytes than requested; `eof` is the only reliable end-of-file signal.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::{RpcClient, RpcError};
use crate::protocol::xdr::{invalid_data, nfs3};

/// Issues `NFSPROC3_READ`.
pub async fn nfsproc3_read(
    client: &mut RpcClient<'_>,
    file: &nfs3::nfs_fh3,
    offset: nfs3::offset3,
    count: nfs3::count3,
) -> Result<nfs3::file::READ3resok, ProcError> {
    let args = nfs3::file::READ3args {
        file: file.clone(),
        offset,
        count,
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_READ, &args)
        .await?;
    let res = decode::<nfs3::file::READ3resok>(&mut nfs_result(payload)?)?;
    if res.data.len() != res.count as usize {
        return Err(RpcError::Decode(invalid_data(&format!(
            "READ count {} disagrees with {} data bytes",
            res.count,
            res.data.len()
        )))
        .into());
    }
    debug!("nfsproc3_read({},{},{}) --> {} bytes eof:{}", file, offset, count, res.count, res.eof);
    Ok(res)
}
