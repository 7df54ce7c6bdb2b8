//! Protocol module registry.
//!
//! Operations are addressed as `"<protocol>.<operation>"`, e.g. `nfs.lookup`.
//! The registry owns everything the operations have in common, so no module
//! can skip it:
//!
//! 1. resolve the operation and enforce POST for write-style operations,
//! 2. validate `host`, `port` and `timeout`,
//! 3. screen the literal destination,
//! 4. hand the module a [`ProbeContext`] whose [`ProbeContext::connect`]
//!    screens resolved addresses before opening any socket,
//! 5. fold the module's result or error into a [`Response`] with `rtt`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::envelope::{Envelope, ProbeError, Response};
use crate::guard;
use crate::modules::{echo::EchoModule, nfs::NfsModule};
use crate::session::{Deadline, Protocol, Session};

/// Request method. Only POST may invoke write-style operations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(ProbeError::validation(format!("Unknown method '{other}'"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// Static description of one operation.
#[derive(Clone, Copy, Debug)]
pub struct OperationSpec {
    pub name: &'static str,
    /// Write-style operations mutate the target and require POST.
    pub write: bool,
    pub summary: &'static str,
}

/// Request parameters as a JSON object, with typed accessors that fail
/// with validation errors.
#[derive(Clone, Debug, Default)]
pub struct Params(Map<String, Value>);

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params(map)
    }
}

/// A float with no fractional part. Integers beyond 64 bits parse as floats
/// and saturate on conversion.
fn whole(n: &serde_json::Number) -> Option<f64> {
    n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0)
}

impl Params {
    /// Accepts a JSON object; `null` counts as no parameters.
    pub fn from_value(value: Value) -> Result<Params, ProbeError> {
        match value {
            Value::Object(map) => Ok(Params(map)),
            Value::Null => Ok(Params::default()),
            _ => Err(ProbeError::validation("request body must be a JSON object")),
        }
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.present(key).is_some()
    }

    pub fn str_opt(&self, key: &str) -> Result<Option<&str>, ProbeError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ProbeError::validation(format!("{key} must be a string"))),
        }
    }

    /// A string that must be present and non-empty.
    pub fn str_req(&self, key: &str) -> Result<&str, ProbeError> {
        match self.str_opt(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(ProbeError::validation(format!("{key} is required"))),
        }
    }

    /// An integer given as a JSON number or a decimal string.
    pub fn i64_opt(&self, key: &str) -> Result<Option<i64>, ProbeError> {
        let invalid = || ProbeError::validation(format!("{key} must be an integer"));
        match self.present(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|_| i64::MAX))
                .or_else(|| whole(n).map(|f| f as i64))
                .map(Some)
                .ok_or_else(invalid),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    pub fn u64_opt(&self, key: &str) -> Result<Option<u64>, ProbeError> {
        let invalid = || ProbeError::validation(format!("{key} must be a non-negative integer"));
        match self.present(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| whole(n).filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(Some)
                .ok_or_else(invalid),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    pub fn u32_opt(&self, key: &str) -> Result<Option<u32>, ProbeError> {
        match self.u64_opt(key)? {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| ProbeError::validation(format!("{key} is out of range"))),
        }
    }

    pub fn bool_opt(&self, key: &str) -> Result<Option<bool>, ProbeError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(_) => Err(ProbeError::validation(format!("{key} must be a boolean"))),
        }
    }

    /// A list of integers given as a JSON array or a comma-separated string.
    pub fn u32_list(&self, key: &str) -> Result<Option<Vec<u32>>, ProbeError> {
        let invalid = || ProbeError::validation(format!("{key} must be a list of integers"));
        match self.present(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()).ok_or_else(invalid))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(Value::String(s)) => s
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(invalid()),
        }
    }
}

/// Validated destination and budget of one operation.
#[derive(Clone, Debug)]
pub struct ProbeContext {
    pub host: String,
    /// Port the caller asked for, or the module default
    pub port: u16,
    pub deadline: Deadline,
    pub config: Arc<ProbeConfig>,
}

impl ProbeContext {
    /// Opens a session to `port` on the context's host, after screening every
    /// address the host resolves to.
    pub async fn connect(&self, port: u16, protocol: Protocol) -> Result<Session, ProbeError> {
        let addrs =
            guard::resolve_and_screen(&self.config.screening, &self.host, port, &self.deadline)
                .await?;
        Ok(Session::connect_addr(addrs[0], protocol, self.deadline).await?)
    }

    /// Milliseconds since the operation started.
    pub fn rtt_ms(&self) -> u64 {
        self.deadline.elapsed().as_millis() as u64
    }
}

/// A protocol family of operations.
#[async_trait]
pub trait ProtocolModule: Send + Sync {
    /// Prefix of the module's operation names.
    fn protocol(&self) -> &'static str;

    fn operations(&self) -> &'static [OperationSpec];

    /// Port used when the request does not name one.
    fn default_port(&self, config: &ProbeConfig) -> u16;

    /// Runs `operation`. Host, port and timeout are already validated.
    async fn execute(
        &self,
        operation: &str,
        params: &Params,
        ctx: &ProbeContext,
    ) -> Result<Envelope, ProbeError>;
}

pub struct Registry {
    config: Arc<ProbeConfig>,
    modules: Vec<Box<dyn ProtocolModule>>,
}

impl Registry {
    pub fn new(config: Arc<ProbeConfig>) -> Registry {
        Registry {
            config,
            modules: Vec::new(),
        }
    }

    /// A registry with the `nfs` and `echo` modules.
    pub fn with_default_modules(config: Arc<ProbeConfig>) -> Registry {
        let mut registry = Registry::new(config);
        registry.register(Box::new(NfsModule));
        registry.register(Box::new(EchoModule));
        registry
    }

    pub fn register(&mut self, module: Box<dyn ProtocolModule>) {
        debug!("registered protocol module {}", module.protocol());
        self.modules.push(module);
    }

    pub fn config(&self) -> &Arc<ProbeConfig> {
        &self.config
    }

    /// Every `(qualified name, spec)` pair, in registration order.
    pub fn operations(&self) -> Vec<(String, OperationSpec)> {
        self.modules
            .iter()
            .flat_map(|m| {
                m.operations().iter().map(move |op| (format!("{}.{}", m.protocol(), op.name), *op))
            })
            .collect()
    }

    fn find(&self, qualified: &str) -> Option<(&dyn ProtocolModule, &'static OperationSpec)> {
        let (protocol, name) = qualified.split_once('.')?;
        let module = self.modules.iter().find(|m| m.protocol() == protocol)?;
        let spec = module.operations().iter().find(|op| op.name == name)?;
        Some((module.as_ref(), spec))
    }

    /// Runs an operation and always produces a response.
    pub async fn handle(&self, operation: &str, method: Method, params: Params) -> Response {
        let started = Instant::now();
        let response = match self.dispatch(operation, method, &params).await {
            Ok(body) => Response::ok(body),
            Err(e) => {
                let mut response = e.into_response();
                if response.is_ok() {
                    response.body.insert("rtt", started.elapsed().as_millis() as u64);
                }
                response
            }
        };
        info!(
            "{} {} -> {} success:{} {}",
            method,
            operation,
            response.status,
            response.body.success,
            response.body.error.as_deref().unwrap_or("")
        );
        response
    }

    async fn dispatch(
        &self,
        operation: &str,
        method: Method,
        params: &Params,
    ) -> Result<Envelope, ProbeError> {
        let (module, spec) = self
            .find(operation)
            .ok_or_else(|| ProbeError::validation(format!("Unknown operation '{operation}'")))?;
        if spec.write && method != Method::Post {
            return Err(ProbeError::MethodNotAllowed {
                method: method.to_string(),
                operation: operation.to_string(),
            });
        }

        let host = params.str_opt("host")?.unwrap_or("").to_string();
        guard::validate_host(&host)?;
        let port = match params.i64_opt("port")? {
            Some(port) => guard::validate_port(port)?,
            None => module.default_port(&self.config),
        };
        let timeout_ms = match params.u64_opt("timeout")? {
            None => self.config.default_timeout_ms,
            Some(t) if t >= 1 && t <= self.config.max_timeout_ms => t,
            Some(_) => {
                return Err(ProbeError::validation(format!(
                    "Timeout must be between 1 and {} ms",
                    self.config.max_timeout_ms
                )))
            }
        };
        guard::screen_host(&self.config.screening, &host)?;

        let ctx = ProbeContext {
            host,
            port,
            deadline: Deadline::after(Duration::from_millis(timeout_ms)),
            config: self.config.clone(),
        };
        let mut envelope = module.execute(spec.name, params, &ctx).await?;
        envelope.insert("rtt", ctx.rtt_ms());
        Ok(envelope)
    }
}
