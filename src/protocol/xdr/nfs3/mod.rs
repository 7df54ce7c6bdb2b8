//! NFS version 3 wire types (RFC 1813).
//!
//! Only what the probe operations send or read is modelled. Result types
//! are the `resok` arms; a non-OK status is read by the procedure layer and
//! the rest of the failure arm is skipped.

#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

pub mod dir;
pub mod file;

pub const PROGRAM: u32 = 100003;
pub const VERSION: u32 = 3;
/// Versions tried by a probe, most preferred first.
pub const PROBE_VERSIONS: [u32; 3] = [3, 4, 2];

pub const NFS3_FHSIZE: usize = 64;
pub const NFS3_COOKIEVERFSIZE: usize = 8;
pub const NFS3_CREATEVERFSIZE: usize = 8;
pub const NFS3_WRITEVERFSIZE: usize = 8;

/// The NFSv3 procedures netprobe issues, with their RFC numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug)]
pub enum NFSProgram {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_READDIR = 16,
}

impl From<NFSProgram> for u32 {
    fn from(proc: NFSProgram) -> u32 {
        proc as u32
    }
}

pub type filename3 = String;
pub type fileid3 = u64;
pub type cookie3 = u64;
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE];
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE];
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

status_enum! {
    pub enum nfsstat3 {
        NFS3_OK = 0 => "ok",
        NFS3ERR_PERM = 1 => "operation not permitted",
        NFS3ERR_NOENT = 2 => "no such file or directory",
        NFS3ERR_IO = 5 => "I/O error",
        NFS3ERR_NXIO = 6 => "no such device or address",
        NFS3ERR_ACCES = 13 => "permission denied",
        NFS3ERR_EXIST = 17 => "file exists",
        NFS3ERR_XDEV = 18 => "cross-device link",
        NFS3ERR_NODEV = 19 => "no such device",
        NFS3ERR_NOTDIR = 20 => "not a directory",
        NFS3ERR_ISDIR = 21 => "is a directory",
        NFS3ERR_INVAL = 22 => "invalid argument",
        NFS3ERR_FBIG = 27 => "file too large",
        NFS3ERR_NOSPC = 28 => "no space left on device",
        NFS3ERR_ROFS = 30 => "read-only file system",
        NFS3ERR_MLINK = 31 => "too many links",
        NFS3ERR_NAMETOOLONG = 63 => "file name too long",
        NFS3ERR_NOTEMPTY = 66 => "directory not empty",
        NFS3ERR_DQUOT = 69 => "disk quota exceeded",
        NFS3ERR_STALE = 70 => "stale file handle",
        NFS3ERR_REMOTE = 71 => "too many levels of remote in path",
        NFS3ERR_BADHANDLE = 10001 => "illegal file handle",
        NFS3ERR_NOT_SYNC = 10002 => "update synchronization mismatch",
        NFS3ERR_BAD_COOKIE = 10003 => "stale directory cookie",
        NFS3ERR_NOTSUPP = 10004 => "operation not supported",
        NFS3ERR_TOOSMALL = 10005 => "buffer too small",
        NFS3ERR_SERVERFAULT = 10006 => "server fault",
        NFS3ERR_BADTYPE = 10007 => "unsupported object type",
        NFS3ERR_JUKEBOX = 10008 => "server busy, retry later",
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    #[default]
    NF3REG = 1,
    NF3DIR = 2,
    NF3BLK = 3,
    NF3CHR = 4,
    NF3LNK = 5,
    NF3SOCK = 6,
    NF3FIFO = 7,
}
impl SerializeEnum for ftype3 {}
impl DeserializeEnum for ftype3 {}

/// Lowercase type name used in envelopes.
impl fmt::Display for ftype3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ftype3::NF3REG => "regular",
            ftype3::NF3DIR => "directory",
            ftype3::NF3BLK => "block-device",
            ftype3::NF3CHR => "char-device",
            ftype3::NF3LNK => "symlink",
            ftype3::NF3SOCK => "socket",
            ftype3::NF3FIFO => "fifo",
        })
    }
}

/// Major and minor numbers of a device file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// An opaque file handle of at most `NFS3_FHSIZE` bytes.
///
/// The bytes mean something only to the server. Envelopes show them as
/// lowercase hex via `Display`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}

impl Serialize for nfs_fh3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.data.serialize(dest)
    }
}

impl Deserialize for nfs_fh3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.data.deserialize(src)?;
        if self.data.len() > NFS3_FHSIZE {
            let len = self.data.len();
            self.data.clear();
            return Err(invalid_data(&format!("file handle of {len} bytes exceeds {NFS3_FHSIZE}")));
        }
        Ok(())
    }
}

impl From<Vec<u8>> for nfs_fh3 {
    fn from(data: Vec<u8>) -> Self {
        nfs_fh3 { data }
    }
}

impl fmt::Display for nfs_fh3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.data))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

impl From<nfstime3> for filetime::FileTime {
    fn from(time: nfstime3) -> Self {
        filetime::FileTime::from_unix_time(i64::from(time.seconds), time.nseconds)
    }
}

/// Full attributes; 84 bytes on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr3 {
    pub ftype: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    /// Bytes actually allocated on the server.
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// The subset of attributes used for weak cache consistency.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

pub type pre_op_attr = Option<wcc_attr>;
pub type post_op_attr = Option<fattr3>;
pub type post_op_fh3 = Option<nfs_fh3>;

/// Before/after attributes of an object a procedure modified. Present in
/// both arms of every modifying procedure's result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_data {
    pub before: pre_op_attr,
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

pub type set_mode3 = Option<mode3>;
pub type set_uid3 = Option<uid3>;
pub type set_gid3 = Option<gid3>;
pub type set_size3 = Option<size3>;

/// `time_how` with its arm data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum set_time {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}
XdrUnion!(set_time {
    void: [0 => DONT_CHANGE, 1 => SET_TO_SERVER_TIME],
    data: [2 => SET_TO_CLIENT_TIME(nfstime3)],
});

/// Attributes to apply to a new object. Unset fields are left to the server.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_time,
    pub mtime: set_time,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

impl sattr3 {
    /// Attributes that only set the permission bits.
    pub fn with_mode(mode: mode3) -> sattr3 {
        sattr3 {
            mode: Some(mode),
            ..Default::default()
        }
    }
}

/// A name inside a directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct diropargs3 {
    pub dir: nfs_fh3,
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

#[derive(Clone, Debug, Default)]
pub struct GETATTR3args {
    pub object: nfs_fh3,
}
DeserializeStruct!(GETATTR3args, object);
SerializeStruct!(GETATTR3args, object);

#[derive(Clone, Debug, Default)]
pub struct GETATTR3resok {
    pub obj_attributes: fattr3,
}
DeserializeStruct!(GETATTR3resok, obj_attributes);
SerializeStruct!(GETATTR3resok, obj_attributes);

#[derive(Clone, Debug, Default)]
pub struct LOOKUP3resok {
    pub object: nfs_fh3,
    pub obj_attributes: post_op_attr,
    pub dir_attributes: post_op_attr,
}
DeserializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);
SerializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);

#[derive(Clone, Debug, Default)]
pub struct RENAME3args {
    pub from: diropargs3,
    pub to: diropargs3,
}
DeserializeStruct!(RENAME3args, from, to);
SerializeStruct!(RENAME3args, from, to);

#[derive(Clone, Debug, Default)]
pub struct RENAME3resok {
    pub fromdir_wcc: wcc_data,
    pub todir_wcc: wcc_data,
}
DeserializeStruct!(RENAME3resok, fromdir_wcc, todir_wcc);
SerializeStruct!(RENAME3resok, fromdir_wcc, todir_wcc);

/// REMOVE and RMDIR share this result.
#[derive(Clone, Debug, Default)]
pub struct REMOVE3resok {
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(REMOVE3resok, dir_wcc);
SerializeStruct!(REMOVE3resok, dir_wcc);
