use std::io::{ErrorKind, Read, Write};

/// Every XDR item is padded to a multiple of this many bytes.
pub const ALIGNMENT: usize = 4;

/// Upper bound for any single variable-length item we agree to decode.
/// Matches the largest record the RPC layer accepts by default.
pub const MAX_OPAQUE_LENGTH: usize = 4 * 1024 * 1024;

const ZEROES: [u8; ALIGNMENT] = [0; ALIGNMENT];

fn padding_len(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// Skips the padding that follows `len` bytes of data.
pub fn read_padding(len: usize, src: &mut impl Read) -> std::io::Result<()> {
    let mut pad = ZEROES;
    src.read_exact(&mut pad[..padding_len(len)])
}

pub fn write_padding(len: usize, dest: &mut impl Write) -> std::io::Result<()> {
    dest.write_all(&ZEROES[..padding_len(len)])
}

/// Reads exactly `length` bytes into `dest` without trusting `length` for
/// the allocation size.
pub fn read_bounded(length: usize, src: &mut impl Read, dest: &mut Vec<u8>) -> std::io::Result<()> {
    if length > MAX_OPAQUE_LENGTH {
        return Err(invalid_data(&format!("opaque length {length} exceeds limit")));
    }
    dest.clear();
    let read = src.by_ref().take(length as u64).read_to_end(dest)?;
    if read != length {
        dest.clear();
        return Err(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("length prefix {length} exceeds remaining data ({read} bytes)"),
        ));
    }
    Ok(())
}

pub fn invalid_data(msg: &str) -> std::io::Error {
    std::io::Error::new(ErrorKind::InvalidData, msg)
}
