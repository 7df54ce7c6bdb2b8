//! Implementation of the `MKDIR` procedure (procedure 9) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.9.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_MKDIR` for `name` inside `dir` with the given permission bits.
///
/// The result has the same shape as CREATE's.
pub async fn nfsproc3_mkdir(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    name: &str,
    mode: nfs3::mode3,
) -> Result<nfs3::file::CREATE3resok, ProcError> {
    debug!("nfsproc3_mkdir({},{:?},{:o})", dir, name, mode);
    let args = nfs3::dir::MKDIR3args {
        dirops: nfs3::diropargs3 {
            dir: dir.clone(),
            name: name.to_string(),
        },
        attributes: nfs3::sattr3::with_mode(mode),
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_MKDIR, &args)
        .await?;
    decode::<nfs3::file::CREATE3resok>(&mut nfs_result(payload)?)
}
