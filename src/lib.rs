//! netprobe - single-shot network protocol probes with an ONC-RPC NFS client at the core
//!
//! Every probe is one short-lived operation: validate the request, screen the
//! destination, open a socket with an absolute deadline, speak a protocol
//! for a few round trips, and fold the outcome into a uniform JSON envelope.
//! The bulk of the crate is a client for NFS version 3 and its MOUNT
//! companion protocol, carried over ONC-RPC on TCP.
//!
//! ## Main Components
//!
//! - `session`: one outbound TCP/UDP socket per probe, every read and write
//!   bounded by the probe's deadline.
//!
//! - `guard`: host/port validation and refusal of screened destinations
//!   before any socket is opened.
//!
//! - `envelope`: the `{success, error?, ...fields}` result and its status.
//!
//! - `protocol`: XDR codec, RPC record marking and call/reply handling, and
//!   the MOUNT and NFSv3 procedures.
//!
//! - `registry` / `modules`: named operations (`nfs.lookup`, `echo.probe`, ...)
//!   and the protocol modules that implement them.
//!
//! - `config`: process-wide settings, optionally read from TOML.
//!
//! ## Standards Compliance
//!
//! - RFC 1813: NFS Version 3 Protocol Specification (including MOUNT v3)
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 4506: XDR: External Data Representation Standard
//! - RFC 862: Echo Protocol

pub mod config;
pub mod envelope;
pub mod guard;
pub mod modules;
pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::xdr;
