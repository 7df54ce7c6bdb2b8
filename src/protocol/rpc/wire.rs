//! RPC message framing as specified in RFC 5531 section 11 (Record Marking Standard).
//!
//! Over a stream transport each RPC message is sent as a *record* made of one
//! or more *fragments*. Every fragment is prefixed with a 4-byte big-endian
//! header whose lower 31 bits carry the fragment length and whose highest bit
//! marks the last fragment of the record.
//!
//! Outgoing calls are always written as a single last fragment. Incoming
//! replies are reassembled from however many fragments the server chose to
//! use, bounded by a caller-supplied record limit so a hostile server cannot
//! make us allocate without bound.

use tracing::trace;

use crate::protocol::rpc::RpcError;
use crate::session::Session;

/// Highest bit of a fragment header.
const LAST_FRAGMENT: u32 = 1 << 31;
/// Maximum fragment size is 2^31 - 1 bytes
const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

/// Splits a fragment header into `(is_last, length)`.
pub fn parse_fragment_header(header: [u8; 4]) -> (bool, usize) {
    let header = u32::from_be_bytes(header);
    ((header & LAST_FRAGMENT) != 0, (header & !LAST_FRAGMENT) as usize)
}

/// Builds a fragment header for `length` bytes.
pub fn fragment_header(length: usize, is_last: bool) -> [u8; 4] {
    let length = length as u32 & !LAST_FRAGMENT;
    let header = if is_last {
        length | LAST_FRAGMENT
    } else {
        length
    };
    header.to_be_bytes()
}

/// Frames `payload` as a record-marked byte string.
///
/// Payloads above the maximum fragment size are split; everything a probe
/// sends fits in one fragment.
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    if payload.is_empty() {
        out.extend_from_slice(&fragment_header(0, true));
        return out;
    }
    let mut offset = 0;
    while offset < payload.len() {
        let fragment_size = std::cmp::min(payload.len() - offset, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= payload.len();
        out.extend_from_slice(&fragment_header(fragment_size, is_last));
        out.extend_from_slice(&payload[offset..offset + fragment_size]);
        offset += fragment_size;
    }
    out
}

/// Writes `payload` to the session as one record.
pub async fn write_record(session: &mut Session, payload: &[u8]) -> Result<(), RpcError> {
    trace!("Writing record length:{}", payload.len());
    session.write(&encode_record(payload)).await?;
    Ok(())
}

/// Reads a single record-marked fragment, appending its payload to `append_to`.
///
/// Returns true if this was the last fragment of the record.
async fn read_fragment(
    session: &mut Session,
    append_to: &mut Vec<u8>,
    max_record_length: usize,
) -> Result<bool, RpcError> {
    let header = session.read_exact(4).await?;
    let (is_last, length) = parse_fragment_header([header[0], header[1], header[2], header[3]]);
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    let total = append_to.len().saturating_add(length);
    if total > max_record_length {
        return Err(RpcError::RecordTooLarge {
            length: total,
            limit: max_record_length,
        });
    }
    let fragment = session.read_exact(length).await?;
    append_to.extend_from_slice(&fragment);
    Ok(is_last)
}

/// Reads one complete record, reassembling fragments until the last one.
pub async fn read_record(
    session: &mut Session,
    max_record_length: usize,
) -> Result<Vec<u8>, RpcError> {
    let mut record = Vec::new();
    while !read_fragment(session, &mut record, max_record_length).await? {}
    trace!("Finished reading record length:{}", record.len());
    Ok(record)
}
