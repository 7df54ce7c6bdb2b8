//! XDR (RFC 4506) encoding for the calls netprobe sends and the replies it
//! reads back.
//!
//! <https://datatracker.ietf.org/doc/html/rfc4506>
//!
//! Every item occupies a whole number of 4-byte big-endian words. XDR types
//! map onto Rust types as follows:
//!
//! | XDR                  | Rust                          |
//! |----------------------|-------------------------------|
//! | `int`, `unsigned`    | `i32`, `u32`                  |
//! | `hyper`, `unsigned hyper` | `i64`, `u64`             |
//! | `bool`               | `bool`                        |
//! | `opaque[n]`          | `[u8; N]`                     |
//! | `opaque<>`, `string<>` | `Vec<u8>`, `String`         |
//! | `T<>`                | `Vec<T>`                      |
//! | `*T` (optional-data) | `Option<T>`                   |
//! | `void`               | `()`                          |
//!
//! Replies come from hosts we do not control, so no length prefix is
//! trusted: variable-length items are read through a bounded reader and a
//! prefix claiming more than the input holds fails with
//! [`std::io::ErrorKind::UnexpectedEof`] before anything is allocated.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};

/// Declares a protocol status enum from a table of
/// `VARIANT = code => "message"` rows. The first row is the success value.
///
/// Besides the codec impls this gives `name()`, the symbolic name that goes
/// into result envelopes, and a `Display` that prints the message.
macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        pub enum $t:ident {
            $ok:ident = $ok_code:literal => $ok_msg:literal,
            $($variant:ident = $code:literal => $msg:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Default, PartialEq, Eq,
            num_derive::FromPrimitive, num_derive::ToPrimitive,
        )]
        #[repr(u32)]
        pub enum $t {
            #[default]
            $ok = $ok_code,
            $($variant = $code,)*
        }
        impl $crate::protocol::xdr::SerializeEnum for $t {}
        impl $crate::protocol::xdr::DeserializeEnum for $t {}

        impl $t {
            pub fn name(&self) -> &'static str {
                match self {
                    $t::$ok => stringify!($ok),
                    $($t::$variant => stringify!($variant),)*
                }
            }
        }

        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $t::$ok => $ok_msg,
                    $($t::$variant => $msg,)*
                })
            }
        }
    };
}

pub mod mount;
pub mod nfs3;
pub mod rpc;
mod utils;

pub use utils::{invalid_data, MAX_OPAQUE_LENGTH};

/// Byte order of every XDR word.
pub type XDREndian = BigEndian;

/// A value that can be written as XDR.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// A value that can be read from XDR in place.
///
/// Decoding into an existing value lets the struct macros fill fields one
/// after another; use [`deserialize`] to get a fresh value instead.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Decodes a `T` starting from `T::default()`.
pub fn deserialize<T>(src: &mut impl Read) -> std::io::Result<T>
where
    T: Deserialize + Default,
{
    let mut val = T::default();
    val.deserialize(src)?;
    Ok(val)
}

/// Serializes a value into a freshly allocated buffer.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.serialize(&mut buf)?;
    Ok(buf)
}

/// Marker for C-like enums written as their signed discriminant.
pub trait SerializeEnum: ToPrimitive {}

impl<T: SerializeEnum> Serialize for T {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self.to_i32() {
            Some(val) => dest.write_i32::<XDREndian>(val),
            None => Err(invalid_data("enum discriminant out of range")),
        }
    }
}

/// Marker for C-like enums read from their signed discriminant. Unknown
/// values are `InvalidData`.
pub trait DeserializeEnum: FromPrimitive {}

impl<T: DeserializeEnum> Deserialize for T {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let val = src.read_i32::<XDREndian>()?;
        *self = FromPrimitive::from_i32(val)
            .ok_or_else(|| invalid_data(&format!("unknown enum discriminant {val}")))?;
        Ok(())
    }
}

impl Serialize for () {
    fn serialize<W: Write>(&self, _dest: &mut W) -> std::io::Result<()> {
        Ok(())
    }
}

impl Deserialize for () {
    fn deserialize<R: Read>(&mut self, _src: &mut R) -> std::io::Result<()> {
        Ok(())
    }
}

/// `bool` is `enum { FALSE = 0, TRUE = 1 }`; any other word is rejected.
impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        u32::from(*self).serialize(dest)
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match src.read_u32::<XDREndian>()? {
            0 => false,
            1 => true,
            other => return Err(invalid_data(&format!("bool encoded as {other}"))),
        };
        Ok(())
    }
}

macro_rules! scalar {
    ($($t:ty => $write:ident, $read:ident;)*) => {$(
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                dest.$write::<XDREndian>(*self)
            }
        }

        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                *self = src.$read::<XDREndian>()?;
                Ok(())
            }
        }
    )*};
}

scalar! {
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
}

/// Fixed-length opaque data: the bytes, then zero padding.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)?;
        utils::write_padding(N, dest)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)?;
        utils::read_padding(N, src)
    }
}

/// Writes a length prefix, refusing lengths that do not fit in a word.
fn write_length<W: Write>(len: usize, dest: &mut W) -> std::io::Result<()> {
    let len = u32::try_from(len).map_err(|_| invalid_data("length does not fit in 32 bits"))?;
    len.serialize(dest)
}

fn read_length<R: Read>(src: &mut R) -> std::io::Result<usize> {
    let len = deserialize::<u32>(src)?;
    len.to_usize().ok_or_else(|| invalid_data("length does not fit in usize"))
}

/// Variable-length opaque data: length, bytes, padding.
impl Serialize for [u8] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        write_length(self.len(), dest)?;
        dest.write_all(self)?;
        utils::write_padding(self.len(), dest)
    }
}

impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_slice().serialize(dest)
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = read_length(src)?;
        utils::read_bounded(length, src, self)?;
        utils::read_padding(length, src)
    }
}

/// Strings share the opaque encoding and must hold UTF-8.
impl Serialize for str {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_bytes().serialize(dest)
    }
}

impl Serialize for String {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_str().serialize(dest)
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let bytes = deserialize::<Vec<u8>>(src)?;
        *self = String::from_utf8(bytes).map_err(|_| invalid_data("string is not UTF-8"))?;
        Ok(())
    }
}

/// Fixed-length arrays carry no count.
impl<const N: usize, T: Serialize> Serialize for [T; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.iter().try_for_each(|item| item.serialize(dest))
    }
}

impl<const N: usize, T: Deserialize> Deserialize for [T; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.iter_mut().try_for_each(|item| item.deserialize(src))
    }
}

/// Variable-length arrays: a count, then the elements.
impl<T: Serialize> Serialize for [T] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        write_length(self.len(), dest)?;
        self.iter().try_for_each(|item| item.serialize(dest))
    }
}

impl<T: Serialize> Serialize for Vec<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_slice().serialize(dest)
    }
}

/// Elements are decoded one by one, so a bogus count runs out of input
/// long before it runs out of memory.
impl<T: Deserialize + Default> Deserialize for Vec<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = read_length(src)?;
        if length > MAX_OPAQUE_LENGTH {
            return Err(invalid_data(&format!("array length {length} exceeds limit")));
        }
        self.clear();
        for _ in 0..length {
            self.push(deserialize::<T>(src)?);
        }
        Ok(())
    }
}

/// Optional-data: a `bool` "value follows" flag, then the value if set.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.is_some().serialize(dest)?;
        match self {
            Some(data) => data.serialize(dest),
            None => Ok(()),
        }
    }
}

impl<T: Deserialize + Default> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = if deserialize::<bool>(src)? {
            Some(deserialize::<T>(src)?)
        } else {
            None
        };
        Ok(())
    }
}

/// Implements [`Serialize`] for a struct by writing the named fields in order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $(self.$element.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by reading the named fields in order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $(self.$element.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Implements both codec traits for a discriminated union.
///
/// `void` arms encode only their discriminant; `data` arms are followed by
/// their payload. The form without labels is shorthand for a union whose
/// arms all carry data.
///
/// ```text
/// XdrUnion!(accept_body {
///     void: [0 => SUCCESS, 1 => PROG_UNAVAIL],
///     data: [2 => PROG_MISMATCH(mismatch_info)],
/// });
/// ```
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! XdrUnion {
    (
        $t:ident {
            void: [$($vtag:literal => $vvar:ident),* $(,)?],
            data: [$($dtag:literal => $dvar:ident($dty:ty)),* $(,)?] $(,)?
        }
    ) => {
        impl $crate::protocol::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                use $crate::protocol::xdr::Serialize as Xdr;
                match self {
                    $($t::$vvar => Xdr::serialize(&($vtag as u32), dest),)*
                    $($t::$dvar(payload) => {
                        Xdr::serialize(&($dtag as u32), dest)?;
                        Xdr::serialize(payload, dest)
                    })*
                }
            }
        }

        impl $crate::protocol::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                *self = match $crate::protocol::xdr::deserialize::<u32>(src)? {
                    $($vtag => $t::$vvar,)*
                    $($dtag => $t::$dvar($crate::protocol::xdr::deserialize::<$dty>(src)?),)*
                    other => {
                        return Err($crate::protocol::xdr::invalid_data(&format!(
                            "unknown {} discriminant {other}",
                            stringify!($t)
                        )))
                    }
                };
                Ok(())
            }
        }
    };
    (
        $t:ident {
            $($dtag:literal => $dvar:ident($dty:ty)),* $(,)?
        }
    ) => {
        $crate::XdrUnion!($t { void: [], data: [$($dtag => $dvar($dty)),*] });
    };
}

pub use crate::DeserializeStruct;
pub use crate::SerializeStruct;
pub use crate::XdrUnion;
