//! In-process MOUNT and NFSv3 server used by the integration tests.
//!
//! The server speaks record-marked ONC-RPC on a loopback TCP port and serves
//! a small in-memory tree under a single export:
//!
//! ```text
//! /export
//! ├── blob.bin     (3 bytes, not UTF-8)
//! ├── docs/
//! │   └── readme.md
//! ├── empty.bin    (0 bytes)
//! └── test.txt
//! ```
//!
//! Both programs share one port. [`Behavior`] controls version ranges and
//! lets tests inject malformed replies.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use netprobe::config::ProbeConfig;
use netprobe::protocol::rpc::wire;
use netprobe::registry::{Method, Params, Registry};
use netprobe::envelope::Response;
use netprobe::xdr::mount::{self, exportnode, exports, mountres3_ok, mountstat3};
use netprobe::xdr::nfs3::dir::{dirlist3, entry3, MKDIR3args, READDIR3args, READDIR3resok};
use netprobe::xdr::nfs3::file::{
    createhow3, stable_how, CREATE3args, CREATE3resok, READ3args, READ3resok, WRITE3args,
    WRITE3resok,
};
use netprobe::xdr::nfs3::{
    self, diropargs3, fattr3, ftype3, nfs_fh3, nfsstat3, nfstime3, wcc_attr, wcc_data,
    GETATTR3args, LOOKUP3resok, REMOVE3resok, RENAME3args, RENAME3resok,
};
use netprobe::xdr::rpc::{
    accept_body, accepted_reply_with, auth_error_reply, auth_stat, prog_mismatch_reply, rpc_body,
    rpc_msg, success_reply,
};
use netprobe::xdr::{deserialize, to_bytes, Deserialize, Serialize};

pub const EXPORT: &str = "/export";
pub const GREETING: &[u8] = b"hello from nfs\n";
pub const BLOB: &[u8] = &[0xff, 0x00, 0xfe];
pub const WRITE_VERIFIER: [u8; 8] = *b"mockverf";
pub const COOKIE_VERIFIER: [u8; 8] = *b"cookies!";

const ROOT: u64 = 1;

/// Knobs for misbehaving servers.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub mount_versions: RangeInclusive<u32>,
    pub nfs_versions: RangeInclusive<u32>,
    /// Split every reply into fragments of at most this many bytes.
    pub fragment_size: Option<usize>,
    /// Answer with a different xid than the call carried.
    pub corrupt_xid: bool,
    /// Deny every call with this authentication error.
    pub reject_auth: Option<auth_stat>,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            mount_versions: 1..=3,
            nfs_versions: 3..=3,
            fragment_size: None,
            corrupt_xid: false,
            reject_auth: None,
        }
    }
}

struct Node {
    attr: fattr3,
    data: Vec<u8>,
    entries: BTreeMap<String, u64>,
}

struct State {
    nodes: BTreeMap<u64, Node>,
    next_id: u64,
    mounts: u32,
    unmounts: u32,
}

pub struct MockServer {
    pub port: u16,
    state: Arc<Mutex<State>>,
}

impl MockServer {
    pub async fn start() -> MockServer {
        MockServer::with_behavior(Behavior::default()).await
    }

    pub async fn with_behavior(behavior: Behavior) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(Mutex::new(State::new()));
        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone(), behavior.clone()));
            }
        });
        MockServer { port, state }
    }

    pub fn mounts(&self) -> u32 {
        self.state.lock().expect("state").mounts
    }

    pub fn unmounts(&self) -> u32 {
        self.state.lock().expect("state").unmounts
    }

    /// Contents of the file at `path` below the export, if it exists.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("state");
        state.resolve(path).map(|id| state.nodes[&id].data.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().expect("state").resolve(path).is_some()
    }

    /// Request parameters aimed at this server.
    pub fn params(&self, extra: Value) -> Params {
        let mut map = serde_json::Map::new();
        map.insert("host".into(), "127.0.0.1".into());
        map.insert("port".into(), self.port.into());
        map.insert("mountPort".into(), self.port.into());
        map.insert("exportPath".into(), EXPORT.into());
        map.insert("timeout".into(), 5000.into());
        if let Value::Object(extra) = extra {
            map.extend(extra);
        }
        Params::from(map)
    }
}

/// Registry with default configuration.
pub fn registry() -> Registry {
    Registry::with_default_modules(Arc::new(ProbeConfig::default()))
}

pub async fn get(registry: &Registry, operation: &str, params: Params) -> Response {
    registry.handle(operation, Method::Get, params).await
}

pub async fn post(registry: &Registry, operation: &str, params: Params) -> Response {
    registry.handle(operation, Method::Post, params).await
}

/// TCP echo server on a loopback port.
pub async fn tcp_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind echo");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    port
}

/// UDP echo server on a loopback port.
pub async fn udp_echo_server() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind udp echo");
    let port = socket.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..n], peer).await;
        }
    });
    port
}

/// A listener that accepts connections and never answers.
pub async fn silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    port
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>, behavior: Behavior) {
    while let Some(record) = read_record(&mut stream).await {
        let Some(reply) = handle_record(&record, &state, &behavior) else {
            return;
        };
        let framed = match behavior.fragment_size {
            Some(size) => fragmented(&reply, size),
            None => wire::encode_record(&reply),
        };
        if stream.write_all(&framed).await.is_err() {
            return;
        }
    }
}

async fn read_record(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut record = Vec::new();
    loop {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await.ok()?;
        let (is_last, length) = wire::parse_fragment_header(header);
        let start = record.len();
        record.resize(start + length, 0);
        stream.read_exact(&mut record[start..]).await.ok()?;
        if is_last {
            return Some(record);
        }
    }
}

fn fragmented(payload: &[u8], size: usize) -> Vec<u8> {
    let chunks: Vec<&[u8]> = payload.chunks(size.max(1)).collect();
    let mut out = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        out.extend_from_slice(&wire::fragment_header(chunk.len(), i + 1 == chunks.len()));
        out.extend_from_slice(chunk);
    }
    out
}

fn handle_record(record: &[u8], state: &Mutex<State>, behavior: &Behavior) -> Option<Vec<u8>> {
    let mut src = Cursor::new(record);
    let msg = deserialize::<rpc_msg>(&mut src).ok()?;
    let rpc_body::CALL(call) = msg.body else {
        return None;
    };
    let xid = if behavior.corrupt_xid {
        msg.xid.wrapping_add(1)
    } else {
        msg.xid
    };

    if let Some(stat) = behavior.reject_auth {
        return Some(bytes(&auth_error_reply(xid, stat)));
    }
    let versions = match call.prog {
        mount::PROGRAM => &behavior.mount_versions,
        nfs3::PROGRAM => &behavior.nfs_versions,
        _ => return Some(bytes(&accepted_reply_with(xid, accept_body::PROG_UNAVAIL))),
    };
    if !versions.contains(&call.vers) {
        return Some(bytes(&prog_mismatch_reply(xid, *versions.start(), *versions.end())));
    }

    let mut state = state.lock().expect("state");
    let result = if call.prog == mount::PROGRAM {
        state.mount(call.proc, &mut src)
    } else {
        state.nfs(call.proc, &mut src)
    };
    Some(match result {
        Ok(body) => {
            let mut out = bytes(&success_reply(xid));
            out.extend_from_slice(&body);
            out
        }
        Err(reply_data) => bytes(&accepted_reply_with(xid, reply_data)),
    })
}

fn bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    to_bytes(value).expect("serialize")
}

fn args<T: Deserialize + Default>(src: &mut Cursor<&[u8]>) -> Result<T, accept_body> {
    deserialize(src).map_err(|_| accept_body::GARBAGE_ARGS)
}

fn handle(id: u64) -> nfs_fh3 {
    nfs_fh3::from(id.to_be_bytes().to_vec())
}

type Reply = Result<Vec<u8>, nfsstat3>;

impl State {
    fn new() -> State {
        let mut state = State {
            nodes: BTreeMap::new(),
            next_id: ROOT,
            mounts: 0,
            unmounts: 0,
        };
        let root = state.add(ftype3::NF3DIR, 0o755, Vec::new());
        state.link(root, "test.txt", ftype3::NF3REG, 0o644, GREETING.to_vec());
        state.link(root, "empty.bin", ftype3::NF3REG, 0o644, Vec::new());
        state.link(root, "blob.bin", ftype3::NF3REG, 0o600, BLOB.to_vec());
        let docs = state.link(root, "docs", ftype3::NF3DIR, 0o755, Vec::new());
        state.link(docs, "readme.md", ftype3::NF3REG, 0o644, b"# docs\n".to_vec());
        state
    }

    fn add(&mut self, ftype: ftype3, mode: u32, data: Vec<u8>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let stamp = nfstime3 {
            seconds: 1_700_000_000,
            nseconds: 500,
        };
        let attr = fattr3 {
            ftype,
            mode,
            nlink: if ftype == ftype3::NF3DIR { 2 } else { 1 },
            uid: 1000,
            gid: 1000,
            size: data.len() as u64,
            used: data.len() as u64,
            fsid: 7,
            fileid: id,
            atime: stamp,
            mtime: stamp,
            ctime: stamp,
            ..Default::default()
        };
        self.nodes.insert(id, Node {
            attr,
            data,
            entries: BTreeMap::new(),
        });
        id
    }

    fn link(&mut self, dir: u64, name: &str, ftype: ftype3, mode: u32, data: Vec<u8>) -> u64 {
        let id = self.add(ftype, mode, data);
        self.nodes.get_mut(&dir).expect("parent").entries.insert(name.to_string(), id);
        id
    }

    fn resolve(&self, path: &str) -> Option<u64> {
        let mut id = ROOT;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            id = *self.nodes.get(&id)?.entries.get(name)?;
        }
        Some(id)
    }

    fn id(&self, fh: &nfs_fh3) -> Result<u64, nfsstat3> {
        let raw = <[u8; 8]>::try_from(fh.data.as_slice()).map_err(|_| nfsstat3::NFS3ERR_BADHANDLE)?;
        let id = u64::from_be_bytes(raw);
        if self.nodes.contains_key(&id) {
            Ok(id)
        } else {
            Err(nfsstat3::NFS3ERR_STALE)
        }
    }

    fn dir_id(&self, fh: &nfs_fh3) -> Result<u64, nfsstat3> {
        let id = self.id(fh)?;
        if self.nodes[&id].attr.ftype != ftype3::NF3DIR {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        Ok(id)
    }

    fn mount(&mut self, proc: u32, src: &mut Cursor<&[u8]>) -> Result<Vec<u8>, accept_body> {
        let mut out = Vec::new();
        match proc {
            0 => {}
            1 => {
                let path = args::<String>(src)?;
                if path == EXPORT {
                    self.mounts += 1;
                    let res = mountres3_ok {
                        fhandle: handle(ROOT).data,
                        auth_flavors: vec![0, 1],
                    };
                    out.extend(bytes(&mountstat3::MNT3_OK));
                    out.extend(bytes(&res));
                } else {
                    out.extend(bytes(&mountstat3::MNT3ERR_NOENT));
                }
            }
            3 => {
                args::<String>(src)?;
                self.unmounts += 1;
            }
            5 => {
                let nodes = vec![
                    exportnode {
                        ex_dir: EXPORT.to_string(),
                        ex_groups: vec!["*".to_string()],
                    },
                    exportnode {
                        ex_dir: "/srv/private".to_string(),
                        ex_groups: vec!["10.0.0.0/8".to_string(), "admin".to_string()],
                    },
                ];
                out.extend(bytes(&exports(nodes)));
            }
            _ => return Err(accept_body::PROC_UNAVAIL),
        }
        Ok(out)
    }

    fn nfs(&mut self, proc: u32, src: &mut Cursor<&[u8]>) -> Result<Vec<u8>, accept_body> {
        let result = match proc {
            0 => return Ok(Vec::new()),
            1 => self.getattr(args(src)?),
            3 => self.lookup(args(src)?),
            6 => self.read(args(src)?),
            7 => self.write(args(src)?),
            8 => self.create(args(src)?),
            9 => self.mkdir(args(src)?),
            12 => self.remove(args(src)?, false),
            13 => self.remove(args(src)?, true),
            14 => self.rename(args(src)?),
            16 => self.readdir(args(src)?),
            _ => return Err(accept_body::PROC_UNAVAIL),
        };
        Ok(match result {
            Ok(body) => {
                let mut out = bytes(&nfsstat3::NFS3_OK);
                out.extend(body);
                out
            }
            Err(stat) => {
                let mut out = bytes(&stat);
                out.extend(bytes(&wcc_data::default()));
                out
            }
        })
    }

    fn getattr(&mut self, args: GETATTR3args) -> Reply {
        let id = self.id(&args.object)?;
        Ok(bytes(&self.nodes[&id].attr))
    }

    fn lookup(&mut self, args: diropargs3) -> Reply {
        let dir = self.dir_id(&args.dir)?;
        let id = *self.nodes[&dir].entries.get(&args.name).ok_or(nfsstat3::NFS3ERR_NOENT)?;
        Ok(bytes(&LOOKUP3resok {
            object: handle(id),
            obj_attributes: Some(self.nodes[&id].attr),
            dir_attributes: Some(self.nodes[&dir].attr),
        }))
    }

    fn read(&mut self, args: READ3args) -> Reply {
        let id = self.id(&args.file)?;
        let node = &self.nodes[&id];
        if node.attr.ftype == ftype3::NF3DIR {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        let start = (args.offset as usize).min(node.data.len());
        let end = start.saturating_add(args.count as usize).min(node.data.len());
        let data = node.data[start..end].to_vec();
        Ok(bytes(&READ3resok {
            file_attributes: Some(node.attr),
            count: data.len() as u32,
            eof: end == node.data.len(),
            data,
        }))
    }

    fn write(&mut self, args: WRITE3args) -> Reply {
        let id = self.id(&args.file)?;
        let node = self.nodes.get_mut(&id).ok_or(nfsstat3::NFS3ERR_STALE)?;
        if node.attr.ftype == ftype3::NF3DIR {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        let before = wcc_attr {
            size: node.attr.size,
            mtime: node.attr.mtime,
            ctime: node.attr.ctime,
        };
        let start = args.offset as usize;
        let end = start + args.data.len();
        if node.data.len() < end {
            node.data.resize(end, 0);
        }
        node.data[start..end].copy_from_slice(&args.data);
        node.attr.size = node.data.len() as u64;
        node.attr.used = node.attr.size;
        Ok(bytes(&WRITE3resok {
            file_wcc: wcc_data {
                before: Some(before),
                after: Some(node.attr),
            },
            count: args.data.len() as u32,
            committed: stable_how::FILE_SYNC,
            verf: WRITE_VERIFIER,
        }))
    }

    fn created(&self, id: u64) -> Vec<u8> {
        bytes(&CREATE3resok {
            obj: Some(handle(id)),
            obj_attributes: Some(self.nodes[&id].attr),
            dir_wcc: wcc_data::default(),
        })
    }

    fn create(&mut self, args: CREATE3args) -> Reply {
        let (mode, guarded) = match args.how {
            createhow3::UNCHECKED(attr) => (attr.mode, false),
            createhow3::GUARDED(attr) => (attr.mode, true),
            createhow3::EXCLUSIVE(_) => (None, true),
        };
        let dir = self.dir_id(&args.dirops.dir)?;
        if let Some(&existing) = self.nodes[&dir].entries.get(&args.dirops.name) {
            if guarded {
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            let node = self.nodes.get_mut(&existing).ok_or(nfsstat3::NFS3ERR_STALE)?;
            node.data.clear();
            node.attr.size = 0;
            return Ok(self.created(existing));
        }
        let id =
            self.link(dir, &args.dirops.name, ftype3::NF3REG, mode.unwrap_or(0o644), Vec::new());
        Ok(self.created(id))
    }

    fn mkdir(&mut self, args: MKDIR3args) -> Reply {
        let dir = self.dir_id(&args.dirops.dir)?;
        if self.nodes[&dir].entries.contains_key(&args.dirops.name) {
            return Err(nfsstat3::NFS3ERR_EXIST);
        }
        let mode = args.attributes.mode.unwrap_or(0o755);
        let id = self.link(dir, &args.dirops.name, ftype3::NF3DIR, mode, Vec::new());
        Ok(self.created(id))
    }

    fn remove(&mut self, args: diropargs3, directory: bool) -> Reply {
        let parent = self.dir_id(&args.dir)?;
        let id = *self.nodes[&parent].entries.get(&args.name).ok_or(nfsstat3::NFS3ERR_NOENT)?;
        let node = &self.nodes[&id];
        let is_dir = node.attr.ftype == ftype3::NF3DIR;
        match (directory, is_dir) {
            (false, true) => return Err(nfsstat3::NFS3ERR_ISDIR),
            (true, false) => return Err(nfsstat3::NFS3ERR_NOTDIR),
            (true, true) if !node.entries.is_empty() => return Err(nfsstat3::NFS3ERR_NOTEMPTY),
            _ => {}
        }
        self.nodes.get_mut(&parent).expect("parent").entries.remove(&args.name);
        self.nodes.remove(&id);
        Ok(bytes(&REMOVE3resok::default()))
    }

    fn rename(&mut self, args: RENAME3args) -> Reply {
        let from = self.dir_id(&args.from.dir)?;
        let to = self.dir_id(&args.to.dir)?;
        let id = self
            .nodes
            .get_mut(&from)
            .expect("dir")
            .entries
            .remove(&args.from.name)
            .ok_or(nfsstat3::NFS3ERR_NOENT)?;
        self.nodes.get_mut(&to).expect("dir").entries.insert(args.to.name.clone(), id);
        Ok(bytes(&RENAME3resok::default()))
    }

    fn readdir(&mut self, args: READDIR3args) -> Reply {
        let dir = self.dir_id(&args.dir)?;
        let node = &self.nodes[&dir];
        // Tiny budgets get one entry per reply so paging can be observed.
        let limit = if args.dircount < 64 { 1 } else { usize::MAX };
        let entries: Vec<entry3> = node
            .entries
            .iter()
            .enumerate()
            .skip(args.cookie as usize)
            .take(limit)
            .map(|(i, (name, &fileid))| entry3 {
                fileid,
                name: name.clone(),
                cookie: i as u64 + 1,
            })
            .collect();
        let eof = args.cookie as usize + entries.len() >= node.entries.len();
        Ok(bytes(&READDIR3resok {
            dir_attributes: Some(node.attr),
            cookieverf: COOKIE_VERIFIER,
            reply: dirlist3 { entries, eof },
        }))
    }
}
