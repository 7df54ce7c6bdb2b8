//! MOUNT version 3 wire types (RFC 1813 Appendix I).
//!
//! A probe uses MOUNT for three things: turning an export path into the
//! root file handle (MNT), releasing it again (UMNT), and listing what the
//! server exports (EXPORT). Versions 1 and 2 share the EXPORT layout, so
//! the same types serve all three versions for that procedure.

#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;

pub const PROGRAM: u32 = 100005;
pub const VERSION: u32 = 3;
/// Versions tried by a probe, most preferred first.
pub const PROBE_VERSIONS: [u32; 3] = [3, 2, 1];

/// Longest export path a server accepts.
pub const MNTPATHLEN: usize = 1024;
/// Longest root handle MOUNT v3 may return.
pub const FHSIZE3: usize = 64;

/// Root handle bytes; the same bytes become an `nfs_fh3`.
pub type fhandle3 = Vec<u8>;
pub type dirpath = String;
pub type name = String;

status_enum! {
    pub enum mountstat3 {
        MNT3_OK = 0 => "ok",
        MNT3ERR_PERM = 1 => "not owner",
        MNT3ERR_NOENT = 2 => "no such export",
        MNT3ERR_IO = 5 => "I/O error",
        MNT3ERR_ACCES = 13 => "access denied",
        MNT3ERR_NOTDIR = 20 => "not a directory",
        MNT3ERR_INVAL = 22 => "invalid argument",
        MNT3ERR_NAMETOOLONG = 63 => "export path too long",
        MNT3ERR_NOTSUPP = 10004 => "operation not supported",
        MNT3ERR_SERVERFAULT = 10006 => "server fault",
    }
}

/// MNT result once the status is `MNT3_OK`.
#[derive(Clone, Debug, Default)]
pub struct mountres3_ok {
    pub fhandle: fhandle3,
    /// Flavors the server will accept for this export.
    pub auth_flavors: Vec<u32>,
}
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// One exported file system and the groups allowed to mount it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct exportnode {
    pub ex_dir: dirpath,
    /// Client or netgroup names; empty means everyone.
    pub ex_groups: Vec<name>,
}

/// EXPORT result: a linked list of `exportnode`.
///
/// On the wire each node is preceded by a `TRUE` "value follows" flag and the
/// list ends with `FALSE`; the groups inside each node use the same encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct exports(pub Vec<exportnode>);

fn serialize_list<W: Write, T>(
    items: &[T],
    dest: &mut W,
    mut each: impl FnMut(&T, &mut W) -> std::io::Result<()>,
) -> std::io::Result<()> {
    for item in items {
        true.serialize(dest)?;
        each(item, dest)?;
    }
    false.serialize(dest)
}

fn deserialize_list<R: Read, T>(
    src: &mut R,
    mut each: impl FnMut(&mut R) -> std::io::Result<T>,
) -> std::io::Result<Vec<T>> {
    let mut items = Vec::new();
    while deserialize::<bool>(src)? {
        if items.len() >= MAX_OPAQUE_LENGTH / 4 {
            return Err(invalid_data("list too long"));
        }
        items.push(each(src)?);
    }
    Ok(items)
}

impl Serialize for exports {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        serialize_list(&self.0, dest, |node, dest| {
            node.ex_dir.serialize(dest)?;
            serialize_list(&node.ex_groups, dest, |group, dest| group.serialize(dest))
        })
    }
}

impl Deserialize for exports {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0 = deserialize_list(src, |src| {
            let ex_dir = deserialize::<dirpath>(src)?;
            let ex_groups = deserialize_list(src, |src| deserialize::<name>(src))?;
            Ok(exportnode { ex_dir, ex_groups })
        })?;
        Ok(())
    }
}

/// MOUNT procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug)]
pub enum MountProgram {
    MOUNTPROC3_NULL = 0,
    MOUNTPROC3_MNT = 1,
    MOUNTPROC3_DUMP = 2,
    MOUNTPROC3_UMNT = 3,
    MOUNTPROC3_UMNTALL = 4,
    MOUNTPROC3_EXPORT = 5,
}

impl From<MountProgram> for u32 {
    fn from(proc: MountProgram) -> u32 {
        proc as u32
    }
}
