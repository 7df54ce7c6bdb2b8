//! The `echo` protocol module (RFC 862).
//!
//! Sends a payload and expects the same bytes back. Over TCP the reply is
//! read until as many bytes as were sent have arrived; over UDP the first
//! datagram is the reply.

use async_trait::async_trait;

use crate::config::ProbeConfig;
use crate::envelope::{Envelope, ProbeError};
use crate::registry::{OperationSpec, Params, ProbeContext, ProtocolModule};
use crate::session::Protocol;

pub const DEFAULT_PORT: u16 = 7;
const DEFAULT_MESSAGE: &str = "netprobe echo\r\n";
/// Keeps UDP payloads inside one unfragmented datagram on common links.
const MAX_MESSAGE: usize = 1400;

const OPERATIONS: &[OperationSpec] = &[OperationSpec {
    name: "probe",
    write: false,
    summary: "Echo round trip",
}];

pub struct EchoModule;

#[async_trait]
impl ProtocolModule for EchoModule {
    fn protocol(&self) -> &'static str {
        "echo"
    }

    fn operations(&self) -> &'static [OperationSpec] {
        OPERATIONS
    }

    fn default_port(&self, _config: &ProbeConfig) -> u16 {
        DEFAULT_PORT
    }

    async fn execute(
        &self,
        _operation: &str,
        params: &Params,
        ctx: &ProbeContext,
    ) -> Result<Envelope, ProbeError> {
        let message = params.str_opt("message")?.unwrap_or(DEFAULT_MESSAGE);
        if message.is_empty() || message.len() > MAX_MESSAGE {
            return Err(ProbeError::validation(format!(
                "message must be between 1 and {MAX_MESSAGE} bytes"
            )));
        }
        let protocol = match params.str_opt("transport")? {
            None => Protocol::Tcp,
            Some(s) => s.parse::<Protocol>().map_err(ProbeError::Validation)?,
        };

        let mut session = ctx.connect(ctx.port, protocol).await?;
        session.write(message.as_bytes()).await?;
        let received = match protocol {
            Protocol::Tcp => session.read_exact(message.len()).await?,
            Protocol::Udp => session.read_available(MAX_MESSAGE).await?,
        };
        session.close();

        let matched = received == message.as_bytes();
        Ok(Envelope::ok()
            .with("transport", if protocol == Protocol::Tcp { "tcp" } else { "udp" })
            .with("sent", message.len())
            .with("received", received.len())
            .with("matched", matched)
            .with("response", String::from_utf8_lossy(&received).into_owned()))
    }
}
