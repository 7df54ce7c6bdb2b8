//! Implementation of the `CREATE` procedure (procedure 8) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.8.

use tracing::debug;

use crate::protocol::nfs::{decode, nfs_result, ProcError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::nfs3::file::createhow3;

/// Issues `NFSPROC3_CREATE` for `name` inside `dir`.
///
/// `how` selects UNCHECKED, GUARDED or EXCLUSIVE creation. With GUARDED the
/// server fails with `NFS3ERR_EXIST` rather than truncating an existing file.
pub async fn nfsproc3_create(
    client: &mut RpcClient<'_>,
    dir: &nfs3::nfs_fh3,
    name: &str,
    how: createhow3,
) -> Result<nfs3::file::CREATE3resok, ProcError> {
    debug!("nfsproc3_create({},{:?},{:?})", dir, name, how);
    let args = nfs3::file::CREATE3args {
        dirops: nfs3::diropargs3 {
            dir: dir.clone(),
            name: name.to_string(),
        },
        how,
    };
    let payload = client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_CREATE, &args)
        .await?;
    decode::<nfs3::file::CREATE3resok>(&mut nfs_result(payload)?)
}
