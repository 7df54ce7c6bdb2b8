//! Implementation of the `READDIR` procedure (procedure 16) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.16.
//!
//! READDIR returns a page of directory entries. Paging is driven by the
//! client: the cookie of the last entry and the cookie verifier of the reply
//! are passed back to get the next page, until `eof` is set.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_READDIR` for one page of `dir`.
///
/// # Arguments
///
/// * `cookie` - 0 for the first page, else the cookie of the last entry seen
/// * `cookieverf` - all zeros for the first page, else the verifier returned with it
/// * `count` - maximum size in bytes of the reply the server should build
pub async fn nfsproc3_readdir(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    cookie: nfs3::cookie3,
    cookieverf: nfs3::cookieverf3,
    count: nfs3::count3,
) -> Result<nfs3::dir::READDIR3resok, ProcError> {
    let args = nfs3::dir::READDIR3args {
        dir: dir.clone(),
        cookie,
        cookieverf,
        dircount: count,
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_READDIR, &args)
        .await?;
    let res = decode::<nfs3::dir::READDIR3resok>(&mut nfs_result(payload)?)?;
    debug!(
        "nfsproc3_readdir({},{}) --> {} entries eof:{}",
        dir,
        cookie,
        res.reply.entries.len(),
        res.reply.eof
    );
    Ok(res)
}
