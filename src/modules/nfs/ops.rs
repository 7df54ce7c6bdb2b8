//! NFS operations. Each one validates its own parameters before any I/O.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    attributes_json, export_path, mode_param, post_op_json, split_parent, split_path, Failure,
    Mounted, Target,
};
use crate::envelope::{Envelope, ProbeError};
use crate::protocol::nfs::mount::{mountproc3_export, mountproc3_null};
use crate::protocol::nfs::v3::{self, walk};
use crate::protocol::nfs::ProcError;
use crate::protocol::rpc::{RpcClient, RpcError};
use crate::protocol::xdr::nfs3::file::{createhow3, stable_how};
use crate::protocol::xdr::nfs3::{self, nfs_fh3};
use crate::protocol::xdr::rpc::opaque_auth;
use crate::protocol::xdr::{mount, nfs3::sattr3};
use crate::registry::Params;
use crate::session::Protocol;

type Outcome = Result<Envelope, Failure>;

/// NULL against every candidate version of one program, each on a fresh session.
async fn probe_versions(
    target: &Target<'_>,
    port: u16,
    program: u32,
    versions: &[u32],
) -> Result<Value, ProbeError> {
    let mut supported = Vec::new();
    let mut results = Map::new();
    for &version in versions {
        let attempt = async {
            let mut session = target.ctx.connect(port, Protocol::Tcp).await?;
            let mut client = RpcClient::new(&mut session, opaque_auth::default())
                .with_max_record_length(target.ctx.config.max_record_length);
            let res = if program == mount::PROGRAM {
                mountproc3_null(&mut client, version).await
            } else {
                v3::nfsproc3_null(&mut client, version).await
            };
            session.close();
            res.map_err(|e| match e {
                ProcError::Rpc(e) => ProbeError::from(e),
                other => ProbeError::Internal(other.to_string()),
            })
        };
        let result = match attempt.await {
            Ok(()) => {
                supported.push(version);
                json!({ "ok": true })
            }
            Err(e @ (ProbeError::Blocked { .. } | ProbeError::Internal(_))) => return Err(e),
            Err(ProbeError::Protocol(RpcError::ProgMismatch { low, high, .. })) => json!({
                "ok": false,
                "error": format!("version {version} not supported"),
                "mismatch": { "low": low, "high": high },
            }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        };
        debug!("program {} v{} on port {}: {}", program, version, port, result);
        results.insert(version.to_string(), result);
    }
    Ok(json!({
        "port": port,
        "supported": !supported.is_empty(),
        "preferred": supported.first(),
        "versions": results,
    }))
}

pub(super) async fn probe(target: &Target<'_>) -> Outcome {
    let mount = probe_versions(target, target.mount_port, mount::PROGRAM, &mount::PROBE_VERSIONS)
        .await?;
    let nfs =
        probe_versions(target, target.ctx.port, nfs3::PROGRAM, &nfs3::PROBE_VERSIONS).await?;
    let any = mount["supported"] == true || nfs["supported"] == true;
    let envelope = if any {
        Envelope::ok()
    } else {
        Envelope::failure(format!("No MOUNT or NFS service responded on {}", target.ctx.host))
    };
    Ok(envelope.with("versions", json!({ "mount": mount, "nfs": nfs })))
}

pub(super) async fn null(target: &Target<'_>) -> Outcome {
    let mut session = target.connect_nfs().await?;
    v3::nfsproc3_null(&mut target.client(&mut session), nfs3::VERSION).await?;
    session.close();
    Ok(Envelope::ok().with("alive", true).with("version", nfs3::VERSION))
}

pub(super) async fn exports(target: &Target<'_>, params: &Params) -> Outcome {
    let version = params.u32_opt("version")?.unwrap_or(mount::VERSION);
    if !(1..=3).contains(&version) {
        return Err(ProbeError::validation("version must be 1, 2 or 3").into());
    }
    let mut session = target.connect_mount().await?;
    let nodes = mountproc3_export(&mut target.client(&mut session), version).await?;
    session.close();
    let exports: Vec<Value> = nodes
        .into_iter()
        .map(|node| json!({ "directory": node.ex_dir, "groups": node.ex_groups }))
        .collect();
    Ok(Envelope::ok().with("count", exports.len()).with("exports", exports))
}

/// Mounts, runs `body` against the NFS session, and always unmounts.
macro_rules! with_mount {
    ($target:expr, $export:expr, |$mounted:ident| $body:expr) => {{
        let mut $mounted = Mounted::mount($target, $export).await?;
        let outcome = async { Ok::<Envelope, Failure>($body) }.await;
        $mounted.unmount($target).await;
        outcome
    }};
}

/// GETATTR for handles whose attributes LOOKUP did not return.
async fn attributes_of(
    client: &mut RpcClient<'_>,
    handle: &nfs_fh3,
    known: nfs3::post_op_attr,
) -> Result<nfs3::fattr3, ProcError> {
    match known {
        Some(attr) => Ok(attr),
        None => v3::nfsproc3_getattr(client, handle).await,
    }
}

pub(super) async fn lookup(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let components = split_path(params.str_req("path")?)?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (handle, attr) = walk(&mut client, &root, &components).await?;
        let attr = attributes_of(&mut client, &handle, attr).await?;
        Envelope::ok()
            .with("found", true)
            .with("fileHandle", handle.to_string())
            .with("type", attr.ftype.to_string())
            .with("attributes", attributes_json(&attr))
    })
}

pub(super) async fn getattr(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let components = split_path(params.str_opt("path")?.unwrap_or("/"))?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (handle, _) = walk(&mut client, &root, &components).await?;
        let attr = v3::nfsproc3_getattr(&mut client, &handle).await?;
        let mut envelope = Envelope::ok().with("fileHandle", handle.to_string());
        if let Value::Object(fields) = attributes_json(&attr) {
            for (key, value) in fields {
                envelope.insert(&key, value);
            }
        }
        envelope
    })
}

pub(super) async fn read(target: &Target<'_>, params: &Params) -> Outcome {
    let config = &target.ctx.config;
    let export = export_path(params)?;
    let components = split_path(params.str_req("path")?)?;
    let offset = params.u64_opt("offset")?.unwrap_or(0);
    let count = params.u32_opt("count")?.unwrap_or(config.read_count);
    if count == 0 || count > config.max_read_count {
        return Err(ProbeError::validation(format!(
            "count must be between 1 and {}",
            config.max_read_count
        ))
        .into());
    }
    let force_base64 = match params.str_opt("encoding")? {
        None | Some("auto") | Some("utf-8") | Some("utf8") => false,
        Some("base64") => true,
        Some(other) => {
            return Err(ProbeError::validation(format!("unknown encoding '{other}'")).into())
        }
    };
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (handle, _) = walk(&mut client, &root, &components).await?;
        let res = v3::nfsproc3_read(&mut client, &handle, offset, count).await?;
        let (encoding, data) = match std::str::from_utf8(&res.data) {
            Ok(text) if !force_base64 => ("utf-8", text.to_string()),
            _ => ("base64", BASE64.encode(&res.data)),
        };
        Envelope::ok()
            .with("offset", offset)
            .with("bytesRead", res.count)
            .with("eof", res.eof)
            .with("encoding", encoding)
            .with("data", data)
            .with("attributes", post_op_json(&res.file_attributes))
    })
}

pub(super) async fn readdir(target: &Target<'_>, params: &Params) -> Outcome {
    let config = &target.ctx.config;
    let export = export_path(params)?;
    let components = split_path(params.str_opt("path")?.unwrap_or("/"))?;
    let cookie = params.u64_opt("cookie")?.unwrap_or(0);
    let cookieverf = match params.str_opt("cookieVerifier")? {
        None => <nfs3::cookieverf3>::default(),
        Some(text) => hex::decode(text)
            .ok()
            .and_then(|bytes| <nfs3::cookieverf3>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| ProbeError::validation("cookieVerifier must be 16 hex digits"))?,
    };
    let count = params.u32_opt("count")?.unwrap_or(config.readdir_count);
    if count == 0 || count > config.max_read_count {
        return Err(ProbeError::validation(format!(
            "count must be between 1 and {}",
            config.max_read_count
        ))
        .into());
    }
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (handle, _) = walk(&mut client, &root, &components).await?;
        let res = v3::nfsproc3_readdir(&mut client, &handle, cookie, cookieverf, count).await?;
        let entries: Vec<Value> = res
            .reply
            .entries
            .iter()
            .map(|e| json!({ "name": e.name, "fileId": e.fileid, "cookie": e.cookie }))
            .collect();
        Envelope::ok()
            .with("count", entries.len())
            .with("entries", entries)
            .with("eof", res.reply.eof)
            .with("cookieVerifier", hex::encode(res.cookieverf))
    })
}

pub(super) async fn write(target: &Target<'_>, params: &Params) -> Outcome {
    let config = &target.ctx.config;
    let export = export_path(params)?;
    let components = split_path(params.str_req("path")?)?;
    let text = params
        .str_opt("data")?
        .ok_or_else(|| ProbeError::validation("data is required"))?;
    let data = match params.str_opt("encoding")?.unwrap_or("utf-8") {
        "utf-8" | "utf8" => text.as_bytes().to_vec(),
        "base64" => BASE64
            .decode(text)
            .map_err(|_| ProbeError::validation("data is not valid base64"))?,
        other => {
            return Err(ProbeError::validation(format!("unknown encoding '{other}'")).into())
        }
    };
    if data.len() > config.max_read_count as usize {
        return Err(ProbeError::validation(format!(
            "data exceeds {} bytes",
            config.max_read_count
        ))
        .into());
    }
    let offset = params.u64_opt("offset")?.unwrap_or(0);
    let stable = match params.str_opt("stable")? {
        None => stable_how::FILE_SYNC,
        Some(s) => s.parse::<stable_how>().map_err(ProbeError::Validation)?,
    };
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (handle, _) = walk(&mut client, &root, &components).await?;
        let res = v3::nfsproc3_write(&mut client, &handle, offset, stable, &data).await?;
        Envelope::ok()
            .with("bytesWritten", res.count)
            .with("committed", res.committed.to_string())
            .with("verifier", hex::encode(res.verf))
            .with("attributes", post_op_json(&res.file_wcc.after))
    })
}

pub(super) async fn create(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let (parent, name) = split_parent(params.str_req("path")?, "path")?;
    let mode = mode_param(params, 0o644)?;
    let attributes = sattr3::with_mode(mode);
    let how = if params.bool_opt("guarded")?.unwrap_or(true) {
        createhow3::GUARDED(attributes)
    } else {
        createhow3::UNCHECKED(attributes)
    };
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (dir, _) = walk(&mut client, &root, &parent).await?;
        let res = v3::nfsproc3_create(&mut client, &dir, &name, how).await?;
        created(res)
    })
}

pub(super) async fn mkdir(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let (parent, name) = split_parent(params.str_req("path")?, "path")?;
    let mode = mode_param(params, 0o755)?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (dir, _) = walk(&mut client, &root, &parent).await?;
        let res = v3::nfsproc3_mkdir(&mut client, &dir, &name, mode).await?;
        created(res)
    })
}

fn created(res: nfs3::file::CREATE3resok) -> Envelope {
    let handle = res.obj.map(|fh| Value::String(fh.to_string())).unwrap_or(Value::Null);
    Envelope::ok()
        .with("created", true)
        .with("fileHandle", handle)
        .with("attributes", post_op_json(&res.obj_attributes))
}

pub(super) async fn remove(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let (parent, name) = split_parent(params.str_req("path")?, "path")?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (dir, _) = walk(&mut client, &root, &parent).await?;
        v3::nfsproc3_remove(&mut client, &dir, &name).await?;
        Envelope::ok().with("removed", true)
    })
}

pub(super) async fn rmdir(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let (parent, name) = split_parent(params.str_req("path")?, "path")?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (dir, _) = walk(&mut client, &root, &parent).await?;
        v3::nfsproc3_rmdir(&mut client, &dir, &name).await?;
        Envelope::ok().with("removed", true)
    })
}

pub(super) async fn rename(target: &Target<'_>, params: &Params) -> Outcome {
    let export = export_path(params)?;
    let (from_parent, from_name) = split_parent(params.str_req("path")?, "path")?;
    let (to_parent, to_name) = split_parent(params.str_req("newPath")?, "newPath")?;
    with_mount!(target, &export, |mounted| {
        let root = mounted.root.clone();
        let mut client = mounted.nfs(target);
        let (from_dir, _) = walk(&mut client, &root, &from_parent).await?;
        let (to_dir, _) = walk(&mut client, &root, &to_parent).await?;
        v3::nfsproc3_rename(&mut client, &from_dir, &from_name, &to_dir, &to_name).await?;
        Envelope::ok().with("renamed", true)
    })
}
