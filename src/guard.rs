//! Destination guard.
//!
//! Runs before any socket is opened. It rejects malformed hosts and ports
//! and refuses to probe destinations covered by the [`ScreeningRules`]. The
//! check happens twice: once on the literal host (name suffix or IP literal)
//! and once on every address the name resolves to, so a name pointing into a
//! blocked network is caught even when it does not look like one.

use std::net::{IpAddr, SocketAddr};

use tracing::{debug, warn};

use crate::config::ScreeningRules;
use crate::envelope::ProbeError;
use crate::session::{self, Deadline};

/// Longest DNS name (RFC 1035) and comfortably above any IPv6 literal.
const MAX_HOST_LENGTH: usize = 253;

/// Checks that `host` is non-empty and uses only letters, digits, `.`, `-` and `:`.
///
/// Surrounding whitespace is not stripped; it fails the character check.
pub fn validate_host(host: &str) -> Result<(), ProbeError> {
    if host.is_empty() {
        return Err(ProbeError::validation("host is required"));
    }
    if host.len() > MAX_HOST_LENGTH {
        return Err(ProbeError::validation("Host is too long"));
    }
    if !host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':')) {
        return Err(ProbeError::validation("Host contains invalid characters"));
    }
    Ok(())
}

/// Checks that `port` lies in 1..=65535.
pub fn validate_port(port: i64) -> Result<u16, ProbeError> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ProbeError::validation("Port must be between 1 and 65535")),
    }
}

/// Screens the literal host without touching the network.
pub fn screen_host(rules: &ScreeningRules, host: &str) -> Result<(), ProbeError> {
    let blocked = match host.parse::<IpAddr>() {
        Ok(addr) => rules.matches_addr(addr),
        Err(_) => rules.matches_name(host),
    };
    if blocked {
        warn!("refusing to probe screened destination {}", host);
        return Err(ProbeError::Blocked {
            host: host.to_string(),
        });
    }
    Ok(())
}

/// Resolves `host` and screens every resulting address.
///
/// Returns the resolved addresses for the caller to connect to, so the
/// address that was checked is the address that gets used.
pub async fn resolve_and_screen(
    rules: &ScreeningRules,
    host: &str,
    port: u16,
    deadline: &Deadline,
) -> Result<Vec<SocketAddr>, ProbeError> {
    screen_host(rules, host)?;
    let addrs = session::resolve(host, port, deadline).await?;
    if let Some(addr) = addrs.iter().find(|addr| rules.matches_addr(addr.ip())) {
        warn!("{} resolves to screened address {}", host, addr.ip());
        return Err(ProbeError::Blocked {
            host: host.to_string(),
        });
    }
    debug!("{} resolved to {:?}", host, addrs);
    Ok(addrs)
}
