//! The `nfs` protocol module.
//!
//! Every file operation follows the same shape: MNT the export on the MOUNT
//! port to get the root handle, walk the request path with LOOKUP on the NFS
//! port, issue the procedure, then UMNT on a best-effort basis. Discovery
//! operations (`probe`, `null`, `exports`) skip the mount.
//!
//! A non-OK status from the server is not an engine failure. Discovery
//! operations (`lookup`, `getattr`, `exports`) report it with `success: true`;
//! all others report `success: false`. Both carry the symbolic status,
//! its numeric code and a readable message.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProbeConfig;
use crate::envelope::{Envelope, ProbeError};
use crate::guard;
use crate::protocol::nfs::mount::{mountproc3_mnt, mountproc3_umnt};
use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::{Credential, RpcClient, RpcError};
use crate::protocol::xdr::mount::{mountstat3, MNTPATHLEN};
use crate::protocol::xdr::nfs3::{self, fattr3, nfs_fh3, nfsstat3, nfstime3};
use crate::protocol::xdr::rpc::opaque_auth;
use crate::registry::{OperationSpec, Params, ProbeContext, ProtocolModule};
use crate::session::{Protocol, Session};

mod ops;

/// Longest name component accepted in a path.
const MAX_NAME_LENGTH: usize = 255;
/// `AUTH_UNIX` carries at most 16 supplementary groups.
const MAX_GIDS: usize = 16;

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "probe",
        write: false,
        summary: "MOUNT and NFS version support",
    },
    OperationSpec {
        name: "null",
        write: false,
        summary: "NFSv3 NULL ping",
    },
    OperationSpec {
        name: "exports",
        write: false,
        summary: "List exported file systems",
    },
    OperationSpec {
        name: "lookup",
        write: false,
        summary: "Resolve a path to a handle",
    },
    OperationSpec {
        name: "getattr",
        write: false,
        summary: "File attributes",
    },
    OperationSpec {
        name: "read",
        write: false,
        summary: "Read file contents",
    },
    OperationSpec {
        name: "readdir",
        write: false,
        summary: "List a directory",
    },
    OperationSpec {
        name: "write",
        write: true,
        summary: "Write file contents",
    },
    OperationSpec {
        name: "create",
        write: true,
        summary: "Create a regular file",
    },
    OperationSpec {
        name: "mkdir",
        write: true,
        summary: "Create a directory",
    },
    OperationSpec {
        name: "remove",
        write: true,
        summary: "Remove a file",
    },
    OperationSpec {
        name: "rmdir",
        write: true,
        summary: "Remove an empty directory",
    },
    OperationSpec {
        name: "rename",
        write: true,
        summary: "Rename an entry",
    },
];

/// Operations that report remote status codes as a successful finding.
fn is_discovery(operation: &str) -> bool {
    matches!(operation, "lookup" | "getattr" | "exports")
}

pub struct NfsModule;

#[async_trait]
impl ProtocolModule for NfsModule {
    fn protocol(&self) -> &'static str {
        "nfs"
    }

    fn operations(&self) -> &'static [OperationSpec] {
        OPERATIONS
    }

    fn default_port(&self, config: &ProbeConfig) -> u16 {
        config.nfs_port
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Params,
        ctx: &ProbeContext,
    ) -> Result<Envelope, ProbeError> {
        let target = Target::parse(params, ctx)?;
        let outcome = match operation {
            "probe" => ops::probe(&target).await,
            "null" => ops::null(&target).await,
            "exports" => ops::exports(&target, params).await,
            "lookup" => ops::lookup(&target, params).await,
            "getattr" => ops::getattr(&target, params).await,
            "read" => ops::read(&target, params).await,
            "readdir" => ops::readdir(&target, params).await,
            "write" => ops::write(&target, params).await,
            "create" => ops::create(&target, params).await,
            "mkdir" => ops::mkdir(&target, params).await,
            "remove" => ops::remove(&target, params).await,
            "rmdir" => ops::rmdir(&target, params).await,
            "rename" => ops::rename(&target, params).await,
            other => return Err(ProbeError::Internal(format!("unhandled nfs operation {other}"))),
        };
        match outcome {
            Ok(envelope) => Ok(envelope),
            Err(Failure::Probe(e)) => Err(e),
            Err(Failure::Remote(status)) => {
                debug!("nfs.{} remote status {}", operation, status.name());
                let mut envelope = if is_discovery(operation) {
                    Envelope::ok()
                } else {
                    Envelope::failure(status.message())
                };
                if operation == "lookup" {
                    envelope.insert("found", false);
                }
                status.describe(&mut envelope);
                Ok(envelope)
            }
        }
    }
}

/// A non-OK status returned by the server.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RemoteStatus {
    Nfs(nfsstat3),
    Mount(mountstat3),
}

impl RemoteStatus {
    fn name(&self) -> &'static str {
        match self {
            RemoteStatus::Nfs(s) => s.name(),
            RemoteStatus::Mount(s) => s.name(),
        }
    }

    fn code(&self) -> u32 {
        match self {
            RemoteStatus::Nfs(s) => *s as u32,
            RemoteStatus::Mount(s) => *s as u32,
        }
    }

    fn message(&self) -> String {
        match self {
            RemoteStatus::Nfs(s) => s.to_string(),
            RemoteStatus::Mount(s) => s.to_string(),
        }
    }

    fn describe(&self, envelope: &mut Envelope) {
        let key = match self {
            RemoteStatus::Nfs(_) => "nfsStatus",
            RemoteStatus::Mount(_) => "mountStatus",
        };
        envelope.insert(key, self.name());
        envelope.insert("statusCode", self.code());
        envelope.insert("statusMessage", self.message());
    }
}

/// Why an NFS operation stopped early.
#[derive(Debug)]
pub(crate) enum Failure {
    Probe(ProbeError),
    Remote(RemoteStatus),
}

impl From<ProbeError> for Failure {
    fn from(e: ProbeError) -> Self {
        Failure::Probe(e)
    }
}

impl From<RpcError> for Failure {
    fn from(e: RpcError) -> Self {
        Failure::Probe(e.into())
    }
}

impl From<ProcError> for Failure {
    fn from(e: ProcError) -> Self {
        match e {
            ProcError::Rpc(e) => e.into(),
            ProcError::Nfs(stat) => Failure::Remote(RemoteStatus::Nfs(stat)),
            ProcError::Mount(stat) => Failure::Remote(RemoteStatus::Mount(stat)),
        }
    }
}

/// Where to connect and who to claim to be.
pub(crate) struct Target<'a> {
    pub ctx: &'a ProbeContext,
    pub mount_port: u16,
    pub cred: opaque_auth,
}

impl<'a> Target<'a> {
    fn parse(params: &Params, ctx: &'a ProbeContext) -> Result<Target<'a>, ProbeError> {
        let mount_port = match params.i64_opt("mountPort")? {
            Some(port) => guard::validate_port(port)?,
            None => ctx.config.mount_port.unwrap_or(ctx.port),
        };
        let credential = match params.str_opt("auth")?.map(|s| s.to_ascii_lowercase()) {
            Some(ref auth) if auth == "none" || auth == "null" => Credential::None,
            None => unix_credential(params, &ctx.config)?,
            Some(ref auth) if auth == "unix" || auth == "sys" => {
                unix_credential(params, &ctx.config)?
            }
            Some(other) => {
                return Err(ProbeError::validation(format!(
                    "auth must be \"unix\" or \"none\", got \"{other}\""
                )))
            }
        };
        let cred = credential.to_opaque_auth()?;
        Ok(Target {
            ctx,
            mount_port,
            cred,
        })
    }

    pub fn client<'s>(&self, session: &'s mut Session) -> RpcClient<'s> {
        RpcClient::new(session, self.cred.clone())
            .with_max_record_length(self.ctx.config.max_record_length)
    }

    pub async fn connect_mount(&self) -> Result<Session, ProbeError> {
        self.ctx.connect(self.mount_port, Protocol::Tcp).await
    }

    pub async fn connect_nfs(&self) -> Result<Session, ProbeError> {
        self.ctx.connect(self.ctx.port, Protocol::Tcp).await
    }
}

fn unix_credential(params: &Params, config: &ProbeConfig) -> Result<Credential, ProbeError> {
    let uid = params.u32_opt("uid")?.unwrap_or(config.uid);
    let gid = params.u32_opt("gid")?.unwrap_or(config.gid);
    let gids = params.u32_list("gids")?.unwrap_or_default();
    if gids.len() > MAX_GIDS {
        return Err(ProbeError::validation(format!("gids may contain at most {MAX_GIDS} entries")));
    }
    Ok(Credential::unix(&config.machine_name, uid, gid, gids))
}

/// An export mounted for the duration of one operation.
pub(crate) struct Mounted {
    export: String,
    mount_session: Session,
    nfs_session: Session,
    pub root: nfs_fh3,
}

impl Mounted {
    /// MNTs `export` and opens the NFS session. If the NFS session cannot be
    /// opened the export is unmounted again before returning.
    pub async fn mount(target: &Target<'_>, export: &str) -> Result<Mounted, Failure> {
        let mut mount_session = target.connect_mount().await?;
        let res = mountproc3_mnt(&mut target.client(&mut mount_session), export).await?;
        let root = nfs_fh3::from(res.fhandle);
        debug!("mounted {} root {}", export, root);
        match target.connect_nfs().await {
            Ok(nfs_session) => Ok(Mounted {
                export: export.to_string(),
                mount_session,
                nfs_session,
                root,
            }),
            Err(e) => {
                unmount(target, &mut mount_session, export).await;
                Err(e.into())
            }
        }
    }

    pub fn nfs<'s>(&'s mut self, target: &Target<'_>) -> RpcClient<'s> {
        target.client(&mut self.nfs_session)
    }

    /// Best-effort UMNT, then both sessions are released.
    pub async fn unmount(mut self, target: &Target<'_>) {
        self.nfs_session.close();
        unmount(target, &mut self.mount_session, &self.export).await;
    }
}

async fn unmount(target: &Target<'_>, session: &mut Session, export: &str) {
    if let Err(e) = mountproc3_umnt(&mut target.client(session), export).await {
        debug!("umnt {} failed: {}", export, e);
    }
    session.close();
}

/// Validates an export path.
pub(crate) fn export_path(params: &Params) -> Result<String, ProbeError> {
    let export = params.str_req("exportPath")?.trim();
    if export.len() > MNTPATHLEN {
        return Err(ProbeError::validation("exportPath is too long"));
    }
    if !export.starts_with('/') {
        return Err(ProbeError::validation("exportPath must be absolute"));
    }
    Ok(export.to_string())
}

/// Splits a path below the export root into name components.
///
/// Empty and `.` segments are dropped; `..` is rejected since it could
/// escape the export.
pub fn split_path(path: &str) -> Result<Vec<String>, ProbeError> {
    let mut components = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ProbeError::validation("path must not contain '..'")),
            name if name.len() > MAX_NAME_LENGTH => {
                return Err(ProbeError::validation(format!(
                    "path component exceeds {MAX_NAME_LENGTH} bytes"
                )))
            }
            name => components.push(name.to_string()),
        }
    }
    Ok(components)
}

/// Splits a path into its parent components and final name.
pub fn split_parent(path: &str, key: &str) -> Result<(Vec<String>, String), ProbeError> {
    let mut components = split_path(path)?;
    match components.pop() {
        Some(name) => Ok((components, name)),
        None => Err(ProbeError::validation(format!("{key} must name an entry below the export"))),
    }
}

/// Parses permission bits: strings are octal ("0644"), numbers are taken as is.
pub(crate) fn mode_param(params: &Params, default: u32) -> Result<u32, ProbeError> {
    let mode = match params.str_opt("mode") {
        Ok(Some(s)) => {
            let digits = s.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8)
                .map_err(|_| ProbeError::validation("mode must be an octal string or a number"))?
        }
        Ok(None) => default,
        Err(_) => params.u32_opt("mode")?.unwrap_or(default),
    };
    if mode > 0o7777 {
        return Err(ProbeError::validation("mode must not exceed 07777"));
    }
    Ok(mode)
}

fn time_json(time: nfstime3) -> Value {
    let time = filetime::FileTime::from(time);
    json!({ "seconds": time.unix_seconds(), "nanoseconds": time.nanoseconds() })
}

/// JSON rendering of `fattr3`.
pub fn attributes_json(attr: &fattr3) -> Value {
    json!({
        "type": attr.ftype.to_string(),
        "mode": attr.mode,
        "modeOctal": format!("{:04o}", attr.mode & 0o7777),
        "nlink": attr.nlink,
        "uid": attr.uid,
        "gid": attr.gid,
        "size": attr.size,
        "used": attr.used,
        "rdev": { "major": attr.rdev.specdata1, "minor": attr.rdev.specdata2 },
        "fsid": attr.fsid,
        "fileId": attr.fileid,
        "atime": time_json(attr.atime),
        "mtime": time_json(attr.mtime),
        "ctime": time_json(attr.ctime),
    })
}

/// Attributes if present, else `null`.
pub(crate) fn post_op_json(attr: &nfs3::post_op_attr) -> Value {
    attr.as_ref().map(attributes_json).unwrap_or(Value::Null)
}
