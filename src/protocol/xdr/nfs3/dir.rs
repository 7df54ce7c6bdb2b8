//! Arguments and results of the directory procedures MKDIR (9) and
//! READDIR (16).

#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;

/// Smallest wire size of an entry (empty name): flag, fileid,
/// name length and cookie.
const MIN_ENTRY_SIZE: usize = 4 + 8 + 4 + 8;

#[derive(Debug, Default)]
pub struct MKDIR3args {
    pub dirops: diropargs3,
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct entry3 {
    pub fileid: fileid3,
    pub name: filename3,
    /// Resume point for the READDIR after this entry.
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

/// One page request. Start with cookie 0 and a zero verifier; continue
/// with the last entry's cookie and the verifier from the previous reply.
#[derive(Debug, Default)]
pub struct READDIR3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    /// Upper bound on the reply size in bytes.
    pub dircount: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, dircount);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, dircount);

/// The entry list of a READDIR reply.
///
/// Entries are a linked list on the wire: every entry is preceded by a
/// `TRUE` "value follows" flag and the list ends with `FALSE`, after which
/// the `eof` flag follows.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct dirlist3 {
    pub entries: Vec<entry3>,
    /// The page ends with the directory's last entry.
    pub eof: bool,
}

impl Serialize for dirlist3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for entry in &self.entries {
            true.serialize(dest)?;
            entry.serialize(dest)?;
        }
        false.serialize(dest)?;
        self.eof.serialize(dest)
    }
}

impl Deserialize for dirlist3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.entries.clear();
        while deserialize::<bool>(src)? {
            if self.entries.len() >= MAX_OPAQUE_LENGTH / MIN_ENTRY_SIZE {
                return Err(invalid_data("directory listing too long"));
            }
            self.entries.push(deserialize::<entry3>(src)?);
        }
        self.eof = deserialize::<bool>(src)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct READDIR3resok {
    pub dir_attributes: post_op_attr,
    pub cookieverf: cookieverf3,
    pub reply: dirlist3,
}
DeserializeStruct!(READDIR3resok, dir_attributes, cookieverf, reply);
SerializeStruct!(READDIR3resok, dir_attributes, cookieverf, reply);
