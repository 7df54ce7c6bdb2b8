//! Transport sessions.
//!
//! A [`Session`] owns exactly one outbound socket (TCP stream or connected UDP
//! socket) for the lifetime of a single probe. Every blocking primitive is
//! bounded by the remaining time of the probe's [`Deadline`], so a server that
//! trickles bytes cannot stretch the budget by answering each partial read just
//! in time. The socket is released on every exit path: explicitly through
//! [`Session::close`] or implicitly when the session is dropped.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Largest datagram we are prepared to receive.
const MAX_DATAGRAM: usize = 65_535;
/// Chunk size for stream reads that do not know the final length.
const READ_CHUNK: usize = 8192;

/// Failures of the transport layer, kept distinct so callers can tell an
/// unreachable host from a slow one.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("DNS resolution failed for {host}: {reason}")]
    Dns { host: String, reason: String },

    #[error("Connection refused by {addr}")]
    Refused { addr: SocketAddr },

    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Timeout after {elapsed_ms} ms while {stage}")]
    Timeout {
        stage: &'static str,
        elapsed_ms: u64,
    },

    #[error("Connection closed by peer")]
    Closed,

    #[error("Session already closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport protocol of a session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// Absolute point in time by which a whole probe must finish.
///
/// A deadline is shared by every session an operation opens, so the budget
/// shrinks as time passes instead of restarting per connection.
#[derive(Copy, Clone, Debug)]
pub struct Deadline {
    started: Instant,
    expires: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Deadline {
        let started = Instant::now();
        Deadline {
            started,
            expires: started + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn timeout_error(&self, stage: &'static str) -> TransportError {
        TransportError::Timeout {
            stage,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    /// Runs `fut` with whatever time is left, failing with
    /// [`TransportError::Timeout`] once the deadline passes.
    pub async fn run<F: Future>(
        &self,
        stage: &'static str,
        fut: F,
    ) -> Result<F::Output, TransportError> {
        if self.is_expired() {
            return Err(self.timeout_error(stage));
        }
        tokio::time::timeout(self.remaining(), fut)
            .await
            .map_err(|_| self.timeout_error(stage))
    }
}

enum Socket {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// A single outbound connection with an absolute deadline.
pub struct Session {
    remote: SocketAddr,
    protocol: Protocol,
    deadline: Deadline,
    socket: Option<Socket>,
    /// Bytes received but not yet handed out (read-until overshoot, datagram tail).
    pending: Vec<u8>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("remote", &self.remote)
            .field("protocol", &self.protocol)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Resolves `host:port`, bounded by the deadline.
pub async fn resolve(
    host: &str,
    port: u16,
    deadline: &Deadline,
) -> Result<Vec<SocketAddr>, TransportError> {
    let lookup = deadline.run("resolving host", tokio::net::lookup_host((host, port))).await?;
    let addrs: Vec<SocketAddr> = lookup
        .map_err(|e| TransportError::Dns {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Dns {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        });
    }
    Ok(addrs)
}

impl Session {
    /// Opens a TCP session to `host:port` with a fresh deadline of `timeout`.
    pub async fn open(host: &str, port: u16, timeout: Duration) -> Result<Session, TransportError> {
        Session::connect(host, port, Protocol::Tcp, Deadline::after(timeout)).await
    }

    /// Resolves `host` and opens a session to its first address.
    pub async fn connect(
        host: &str,
        port: u16,
        protocol: Protocol,
        deadline: Deadline,
    ) -> Result<Session, TransportError> {
        let addrs = resolve(host, port, &deadline).await?;
        Session::connect_addr(addrs[0], protocol, deadline).await
    }

    /// Opens a session to an already resolved address. Exactly one connection
    /// attempt is made.
    pub async fn connect_addr(
        remote: SocketAddr,
        protocol: Protocol,
        deadline: Deadline,
    ) -> Result<Session, TransportError> {
        let socket = match protocol {
            Protocol::Tcp => {
                let stream = deadline
                    .run("connecting", TcpStream::connect(remote))
                    .await?
                    .map_err(|e| connect_error(remote, e))?;
                let _ = stream.set_nodelay(true);
                Socket::Tcp(stream)
            }
            Protocol::Udp => {
                let local: SocketAddr = if remote.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local).await?;
                socket.connect(remote).await.map_err(|e| connect_error(remote, e))?;
                Socket::Udp(socket)
            }
        };
        debug!("opened {:?} session to {}", protocol, remote);
        Ok(Session {
            remote,
            protocol,
            deadline,
            socket: Some(socket),
            pending: Vec::new(),
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Releases the socket. Returns `true` only for the call that actually
    /// closed it; later calls are no-ops.
    pub fn close(&mut self) -> bool {
        match self.socket.take() {
            Some(_) => {
                debug!("closed session to {}", self.remote);
                self.pending.clear();
                true
            }
            None => false,
        }
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let deadline = self.deadline;
        match self.socket.as_mut().ok_or(TransportError::SessionClosed)? {
            Socket::Tcp(stream) => {
                deadline.run("writing", stream.write_all(bytes)).await??;
            }
            Socket::Udp(socket) => {
                deadline.run("sending datagram", socket.send(bytes)).await??;
            }
        }
        trace!("wrote {} bytes to {}", bytes.len(), self.remote);
        Ok(())
    }

    /// Receives whatever the next read yields into the pending buffer.
    /// Returns the number of new bytes; zero means the peer closed.
    async fn fill(&mut self, stage: &'static str) -> Result<usize, TransportError> {
        let deadline = self.deadline;
        let n = match self.socket.as_mut().ok_or(TransportError::SessionClosed)? {
            Socket::Tcp(stream) => {
                let mut chunk = [0_u8; READ_CHUNK];
                let n = deadline.run(stage, stream.read(&mut chunk)).await??;
                self.pending.extend_from_slice(&chunk[..n]);
                n
            }
            Socket::Udp(socket) => {
                let mut datagram = vec![0_u8; MAX_DATAGRAM];
                let n = deadline.run(stage, socket.recv(&mut datagram)).await??;
                self.pending.extend_from_slice(&datagram[..n]);
                n
            }
        };
        trace!("received {} bytes from {}", n, self.remote);
        Ok(n)
    }

    /// Reads exactly `n` bytes or fails.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        while self.pending.len() < n {
            if self.fill("reading").await? == 0 {
                return Err(TransportError::Closed);
            }
        }
        Ok(self.pending.drain(..n).collect())
    }

    /// Reads up to and including `delimiter`, giving up after `max_len` bytes.
    pub async fn read_until(
        &mut self,
        delimiter: &[u8],
        max_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        if delimiter.is_empty() {
            return Ok(Vec::new());
        }
        let mut searched = 0;
        loop {
            if let Some(pos) = find(&self.pending[searched..], delimiter) {
                let end = searched + pos + delimiter.len();
                return Ok(self.pending.drain(..end).collect());
            }
            searched = self.pending.len().saturating_sub(delimiter.len() - 1);
            if self.pending.len() >= max_len {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("delimiter not found within {max_len} bytes"),
                )));
            }
            if self.fill("reading until delimiter").await? == 0 {
                return Err(TransportError::Closed);
            }
        }
    }

    /// Returns whatever is available from a single read, at most `max_bytes`.
    /// An empty result means the peer closed the stream.
    pub async fn read_available(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if self.pending.is_empty() {
            self.fill("reading").await?;
        }
        let n = self.pending.len().min(max_bytes);
        Ok(self.pending.drain(..n).collect())
    }
}

fn connect_error(addr: SocketAddr, e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => TransportError::Refused { addr },
        _ => TransportError::Connect { addr, source: e },
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_delimiter() {
        assert_eq!(find(b"abc\r\ndef", b"\r\n"), Some(3));
        assert_eq!(find(b"abc", b"\r\n"), None);
    }

    #[tokio::test]
    async fn expired_deadline_fails_fast() {
        let deadline = Deadline::after(Duration::ZERO);
        let err = deadline.run("waiting", std::future::pending::<()>()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { stage: "waiting", .. }));
    }
}
