//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a working configuration. A file only needs the keys it changes:
//!
//! ```text
//! default_timeout_ms = 5000
//! nfs_port = 2049
//! mount_port = 20048
//! machine_name = "scanner01"
//!
//! [screening]
//! hostname_suffixes = ["cloudflare.com"]
//! networks = ["104.16.0.0/13"]
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use ipnet::IpNet;
use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "NETPROBE_CONFIG";

/// Published Cloudflare edge ranges.
const CLOUDFLARE_NETWORKS: &[&str] = &[
    "173.245.48.0/20",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "141.101.64.0/18",
    "108.162.192.0/18",
    "190.93.240.0/20",
    "188.114.96.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "162.158.0.0/15",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "172.64.0.0/13",
    "131.0.72.0/22",
    "2400:cb00::/32",
    "2606:4700::/32",
    "2803:f800::/32",
    "2405:b500::/32",
    "2405:8100::/32",
    "2a06:98c0::/29",
    "2c0f:f248::/32",
];

/// Domains owned by Cloudflare whose names resolve into its edge.
const CLOUDFLARE_SUFFIXES: &[&str] = &[
    "cloudflare.com",
    "cloudflare.net",
    "cloudflare-dns.com",
    "cloudflareinsights.com",
    "workers.dev",
    "pages.dev",
    "trycloudflare.com",
];

static DEFAULT_SCREENING: Lazy<ScreeningRules> = Lazy::new(|| ScreeningRules {
    hostname_suffixes: CLOUDFLARE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
    networks: CLOUDFLARE_NETWORKS.iter().filter_map(|s| s.parse().ok()).collect(),
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Destinations that must never be probed.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreeningRules {
    /// Host names equal to, or ending in `.` + one of, these suffixes are blocked.
    pub hostname_suffixes: Vec<String>,
    /// Addresses inside any of these networks are blocked.
    pub networks: Vec<IpNet>,
}

impl Default for ScreeningRules {
    fn default() -> Self {
        DEFAULT_SCREENING.clone()
    }
}

impl ScreeningRules {
    /// Rules that block nothing.
    pub fn none() -> Self {
        ScreeningRules {
            hostname_suffixes: Vec::new(),
            networks: Vec::new(),
        }
    }

    pub fn matches_name(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.hostname_suffixes.iter().any(|suffix| {
            let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
            host == suffix || host.ends_with(&format!(".{suffix}"))
        })
    }

    pub fn matches_addr(&self, addr: IpAddr) -> bool {
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
            v4 => v4,
        };
        self.networks.iter().any(|net| net.contains(&addr))
    }
}

/// Process-wide settings shared read-only by every operation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Budget of an operation that does not name one
    pub default_timeout_ms: u64,
    /// Largest budget a request may ask for
    pub max_timeout_ms: u64,
    pub nfs_port: u16,
    /// MOUNT port; `None` means the NFS port
    pub mount_port: Option<u16>,
    /// Machine name sent in `AUTH_UNIX` credentials
    pub machine_name: String,
    pub uid: u32,
    pub gid: u32,
    /// READ size when a request names none
    pub read_count: u32,
    pub max_read_count: u32,
    pub readdir_count: u32,
    /// Largest reassembled RPC reply accepted
    pub max_record_length: usize,
    pub screening: ScreeningRules,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            default_timeout_ms: 10_000,
            max_timeout_ms: 60_000,
            nfs_port: 2049,
            mount_port: None,
            machine_name: "netprobe".to_string(),
            uid: 0,
            gid: 0,
            read_count: 4096,
            max_read_count: 1024 * 1024,
            readdir_count: 8192,
            max_record_length: 4 * 1024 * 1024,
            screening: ScreeningRules::default(),
        }
    }
}

impl ProbeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the configuration file with TOML format.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` if given, else the file named by `NETPROBE_CONFIG`, else
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::read(Path::new(&path)),
                None => Ok(Self::default()),
            },
        }
    }
}
