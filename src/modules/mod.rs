//! Protocol modules registered with the [`Registry`](crate::registry::Registry).
//!
//! - `nfs`: MOUNT/NFSv3 discovery and file operations over ONC-RPC.
//! - `echo`: RFC 862 echo round trip over TCP or UDP.

pub mod echo;
pub mod nfs;
