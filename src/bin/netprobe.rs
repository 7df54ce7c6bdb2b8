//! Command-line front end: runs one operation and prints its envelope as JSON.
//!
//! ```text
//! netprobe nfs.exports '{"host": "10.0.0.5"}'
//! echo '{"host":"10.0.0.5","exportPath":"/srv","path":"a.txt"}' | netprobe nfs.read
//! netprobe --method POST nfs.mkdir '{"host":"10.0.0.5","exportPath":"/srv","path":"new"}'
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use netprobe::config::ProbeConfig;
use netprobe::registry::{Method, Params, Registry};

#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(
    about = "Single-shot network protocol probes (NFS/MOUNT over ONC-RPC, echo)",
    long_about = None
)]
struct Cli {
    #[arg(long, help = "TOML configuration file (default: $NETPROBE_CONFIG)")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "GET", help = "Request method; write operations need POST")]
    method: String,

    #[arg(long, help = "List the available operations and exit")]
    list: bool,

    #[arg(help = "Operation to run, e.g. nfs.lookup")]
    operation: Option<String>,

    #[arg(help = "JSON request object; read from stdin when omitted")]
    request: Option<String>,
}

/// Initialize tracing subscriber for logging
fn init_logging() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("netprobe=info"))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = ProbeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let registry = Registry::with_default_modules(Arc::new(config));

    if cli.list {
        for (name, spec) in registry.operations() {
            let method = if spec.write { "POST" } else { "any" };
            println!("{name:<14} {method:<5} {}", spec.summary);
        }
        return Ok(());
    }

    let Some(operation) = cli.operation else {
        eprintln!("No operation specified. Use --list to see operations or --help for usage.");
        std::process::exit(2);
    };

    let raw = match cli.request {
        Some(raw) => raw,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw).context("reading request from stdin")?;
            raw
        }
    };

    let response = match parse_request(&cli.method, &raw) {
        Ok((method, params)) => registry.handle(&operation, method, params).await,
        Err(e) => e.into_response(),
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_ok() {
        eprintln!("status {}", response.status);
        std::process::exit(1);
    }
    Ok(())
}

fn parse_request(
    method: &str,
    raw: &str,
) -> Result<(Method, Params), netprobe::envelope::ProbeError> {
    let method = method.parse::<Method>()?;
    let value = if raw.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(raw).map_err(|e| {
            netprobe::envelope::ProbeError::validation(format!("request is not valid JSON: {e}"))
        })?
    };
    Ok((method, Params::from_value(value)?))
}
