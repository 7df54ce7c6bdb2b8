//! MOUNT protocol client as specified in RFC 1813 Appendix I.
//! https://datatracker.ietf.org/doc/html/rfc1813#appendix-I
//!
//! NULL and EXPORT are issued at whatever version the caller chooses (1, 2
//! or 3 all share the same wire format for these two procedures). MNT and
//! UMNT always use version 3, since only version 3 returns an NFSv3 handle.

mod export;
mod mnt;
mod null;
mod umnt;

pub use export::mountproc3_export;
pub use mnt::mountproc3_mnt;
pub use null::mountproc3_null;
pub use umnt::mountproc3_umnt;
