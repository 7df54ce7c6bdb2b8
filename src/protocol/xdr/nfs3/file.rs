//! Arguments and results of the file procedures: READ (6), WRITE (7) and
//! CREATE (8).

#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

#[derive(Debug, Default)]
pub struct READ3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}
DeserializeStruct!(READ3args, file, offset, count);
SerializeStruct!(READ3args, file, offset, count);

/// `count` may be shorter than requested; `eof` says whether the read
/// reached the end of the file.
#[derive(Debug, Default)]
pub struct READ3resok {
    pub file_attributes: post_op_attr,
    pub count: count3,
    pub eof: bool,
    pub data: Vec<u8>,
}
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);
SerializeStruct!(READ3resok, file_attributes, count, eof, data);

/// How far the server must commit a WRITE before replying.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    #[default]
    UNSTABLE = 0,
    DATA_SYNC = 1,
    FILE_SYNC = 2,
}
impl SerializeEnum for stable_how {}
impl DeserializeEnum for stable_how {}

impl fmt::Display for stable_how {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            stable_how::UNSTABLE => "unstable",
            stable_how::DATA_SYNC => "data_sync",
            stable_how::FILE_SYNC => "file_sync",
        })
    }
}

impl std::str::FromStr for stable_how {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unstable" => Ok(stable_how::UNSTABLE),
            "data_sync" | "datasync" => Ok(stable_how::DATA_SYNC),
            "file_sync" | "filesync" => Ok(stable_how::FILE_SYNC),
            other => Err(format!("unknown stable mode '{other}'")),
        }
    }
}

/// `count` must equal `data.len()`.
#[derive(Debug, Default)]
pub struct WRITE3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
    pub stable: stable_how,
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE3args, file, offset, count, stable, data);
SerializeStruct!(WRITE3args, file, offset, count, stable, data);

/// `committed` may be stronger than what was asked for, never weaker.
#[derive(Debug, Default)]
pub struct WRITE3resok {
    pub file_wcc: wcc_data,
    pub count: count3,
    pub committed: stable_how,
    /// Changes when the server restarts.
    pub verf: writeverf3,
}
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

/// How CREATE treats an existing name; the discriminant is the create mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum createhow3 {
    /// Create, or truncate an existing file, applying the attributes.
    UNCHECKED(sattr3),
    /// Fail with `NFS3ERR_EXIST` if the name is taken.
    GUARDED(sattr3),
    /// Exclusive create keyed by the verifier.
    EXCLUSIVE(createverf3),
}
XdrUnion!(createhow3 {
    0 => UNCHECKED(sattr3),
    1 => GUARDED(sattr3),
    2 => EXCLUSIVE(createverf3),
});

impl Default for createhow3 {
    fn default() -> createhow3 {
        createhow3::UNCHECKED(sattr3::default())
    }
}

#[derive(Debug, Default)]
pub struct CREATE3args {
    pub dirops: diropargs3,
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, dirops, how);
SerializeStruct!(CREATE3args, dirops, how);

/// Result of CREATE and MKDIR.
#[derive(Debug, Default)]
pub struct CREATE3resok {
    /// Servers may omit the handle; a LOOKUP then recovers it.
    pub obj: post_op_fh3,
    pub obj_attributes: post_op_attr,
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(CREATE3resok, obj, obj_attributes, dir_wcc);
SerializeStruct!(CREATE3resok, obj, obj_attributes, dir_wcc);
