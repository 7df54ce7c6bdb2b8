//! Implementation of the `RENAME` procedure (procedure 14) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.14.
//!
//! Source and target are each a directory handle plus a name, so a rename
//! can move an entry between directories of the same file system.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

/// Issues `NFSPROC3_RENAME` from `from_dir/from_name` to `to_dir/to_name`.
pub async fn nfsproc3_rename(
    client: &mut RpcClient<'_>,
    from_dir: &nfs3::nfs_fh3,
    from_name: &str,
    to_dir: &nfs3::nfs_fh3,
    to_name: &str,
) -> Result<nfs3::RENAME3resok, ProcError> {
    debug!("nfsproc3_rename({},{:?} -> {},{:?})", from_dir, from_name, to_dir, to_name);
    let args = nfs3::RENAME3args {
        from: nfs3::diropargs3 {
            dir: from_dir.clone(),
            name: from_name.to_string(),
        },
        to: nfs3::diropargs3 {
            dir: to_dir.clone(),
            name: to_name.to_string(),
        },
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_RENAME, &args)
        .await?;
    decode::<nfs3::RENAME3resok>(&mut nfs_result(payload)?)
}
