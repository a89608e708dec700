//! Server configuration and declarative mapping files.
//!
//! A configuration file looks like:
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 8080
//!   verbose: true
//! metrics:
//!   port: 9090
//! mappings:
//!   - name: chat
//!     request:
//!       method: POST
//!       path: /v1/chat/completions
//!     response:
//!       json: {"id": "chatcmpl-1"}
//! ```

mod mappings;

pub use mappings::{BodyMode, MappingConfig, RequestConfig, ResponseConfig, StreamConfig};

use crate::error::MokksyError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// Mappings are compiled here so that bad paths, regexes or bodies fail
    /// at load time rather than when the first request arrives.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.server.validate()?;

        for (index, mapping) in self.mappings.iter().enumerate() {
            mapping.compile().with_context(|| {
                format!(
                    "Mapping #{} ({}) is invalid",
                    index + 1,
                    mapping.name.as_deref().unwrap_or("unnamed")
                )
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// IP literal or host name; names are resolved when the server starts
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 binds an ephemeral port
    #[serde(default)]
    pub port: u16,
    /// Log every match at info level and list mappings on misses
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            verbose: false,
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Address to bind. Host names are resolved; the first address wins.
    pub async fn socket_addr(&self) -> crate::Result<SocketAddr> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                MokksyError::Config(format!("cannot resolve server host '{}': {}", self.host, e))
            })?;
        addrs.next().ok_or_else(|| {
            MokksyError::Config(format!("server host '{}' resolved to no address", self.host))
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.host.is_empty() || self.host.contains(|c: char| c.is_whitespace() || c == '/') {
            anyhow::bail!("invalid server host '{}'", self.host);
        }
        self.shutdown.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Time open connections get to finish in-flight responses
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Overall limit; connections left after the grace period are aborted
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_grace_period_ms() -> u64 {
    500
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.timeout_ms < self.grace_period_ms {
            anyhow::bail!(
                "shutdown.timeout_ms ({}) must be >= shutdown.grace_period_ms ({})",
                self.timeout_ms,
                self.grace_period_ms
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on this port when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}
