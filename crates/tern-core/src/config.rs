//! Server configuration

use crate::{Error, Result};
use std::net::SocketAddr;
use tern_router::PrefixPolicy;

/// Default cap on one buffered request, matching the single 8 KiB read
/// buffer the wire protocol was designed around.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    /// Runtime worker threads
    pub workers: usize,
    /// Largest request frame accepted before the connection is dropped
    pub max_request_size: usize,
    /// Size of each socket read
    pub read_buffer_size: usize,
    /// How `literal{name}` segments treat their prefix
    pub prefix_policy: PrefixPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            read_buffer_size: 8 * 1024,
            prefix_policy: PrefixPolicy::Permissive,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn prefix_policy(mut self, policy: PrefixPolicy) -> Self {
        self.prefix_policy = policy;
        self
    }

    /// Socket address to bind
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address {}:{}: {}", self.hostname, self.port, e)))
    }

    /// Defaults overridden by `TERN_*` environment variables
    ///
    /// - `TERN_HOST`, `TERN_PORT`, `TERN_WORKERS`
    /// - `TERN_MAX_REQUEST_SIZE` (bytes)
    /// - `TERN_STRICT_PREFIX` (`true`/`false`, `1`/`0`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("TERN_HOST") {
            config.hostname = host;
        }
        if let Some(port) = lookup("TERN_PORT") {
            config.port = parse_var("TERN_PORT", &port)?;
        }
        if let Some(workers) = lookup("TERN_WORKERS") {
            config.workers = parse_var("TERN_WORKERS", &workers)?;
        }
        if let Some(size) = lookup("TERN_MAX_REQUEST_SIZE") {
            config.max_request_size = parse_var("TERN_MAX_REQUEST_SIZE", &size)?;
        }
        if let Some(strict) = lookup("TERN_STRICT_PREFIX") {
            config.prefix_policy = match strict.as_str() {
                "1" | "true" => PrefixPolicy::Strict,
                "0" | "false" => PrefixPolicy::Permissive,
                other => {
                    return Err(Error::Config(format!(
                        "TERN_STRICT_PREFIX: expected true/false, got {:?}",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.max_request_size == 0 || self.read_buffer_size == 0 {
            return Err(Error::Config("buffer sizes must be non-zero".to_string()));
        }
        self.addr().map(|_| ())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::Config(format!("{}: {:?}: {}", key, value, e)))
}
