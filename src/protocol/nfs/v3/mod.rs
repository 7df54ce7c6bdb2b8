//! NFSv3 (Network File System version 3) client procedures as specified in RFC 1813.
//!
//! This module issues the subset of the 22 NFSv3 procedures a probe needs:
//!
//! 1. NULL - Do nothing (ping the server)
//! 2. GETATTR - Get file attributes
//! 3. LOOKUP - Look up file name
//! 4. READ - Read from file
//! 5. WRITE - Write to file
//! 6. CREATE - Create a file
//! 7. MKDIR - Create a directory
//! 8. REMOVE - Remove a file
//! 9. RMDIR - Remove a directory
//! 10. RENAME - Rename a file or directory
//! 11. READDIR - Read from directory
//!
//! Each procedure is implemented in its own module. A procedure encodes its
//! arguments, makes one call through the supplied
//! [`RpcClient`](crate::protocol::rpc::RpcClient), checks the leading
//! `nfsstat3` and decodes the success arm. Paths are never sent to the
//! server: [`walk`] resolves them one component at a time with LOOKUP.

use tracing::trace;

use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs3;

mod create;
mod getattr;
mod lookup;
mod mkdir;
mod null;
mod read;
mod readdir;
mod remove;
mod rename;
mod rmdir;
mod write;

pub use create::nfsproc3_create;
pub use getattr::nfsproc3_getattr;
pub use lookup::nfsproc3_lookup;
pub use mkdir::nfsproc3_mkdir;
pub use null::nfsproc3_null;
pub use read::nfsproc3_read;
pub use readdir::nfsproc3_readdir;
pub use remove::nfsproc3_remove;
pub use rename::nfsproc3_rename;
pub use rmdir::nfsproc3_rmdir;
pub use write::nfsproc3_write;

/// Resolves `components` below `root`, one LOOKUP per component.
///
/// Returns the handle of the final object and, when the server sent them,
/// its attributes. An empty component list resolves to `root` itself with
/// no attributes.
pub async fn walk(
    client: &mut RpcClient<'_>,
    root: &nfs3::nfs_fh3,
    components: &[String],
) -> Result<(nfs3::nfs_fh3, nfs3::post_op_attr), ProcError> {
    let mut current = root.clone();
    let mut attributes = None;
    for name in components {
        trace!("walk {} / {:?}", current, name);
        let res = nfsproc3_lookup(client, &current, name).await?;
        current = res.object;
        attributes = res.obj_attributes;
    }
    Ok((current, attributes))
}
