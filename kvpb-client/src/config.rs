//! # Client Configuration
//!
//! Purpose: Describe the cluster the client talks to and the limits the pool
//! and operations run under.
//!
//! ## Design Principles
//! 1. **Immutable After Construction**: pools copy what they need; changing a
//!    `ClientConfig` afterwards has no effect on a running pool.
//! 2. **Zero Means Unlimited**: `max_total` and `max_connections` use 0 for
//!    "no cap".
//! 3. **Validated Early**: `validate` rejects configurations that could never
//!    produce a working pool.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kvpb_common::{KvError, KvResult, DEFAULT_MAX_FRAME_LEN};

/// Default server port of the protocol.
pub const DEFAULT_PORT: u16 = 8087;

/// One cluster member the pool may open connections to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name or IP literal.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// Per-host connection cap (0 = unlimited).
    #[serde(default)]
    pub max_connections: usize,
}

impl HostConfig {
    pub fn new(host: impl Into<String>, port: u16, max_connections: usize) -> Self {
        HostConfig {
            host: host.into(),
            port,
            max_connections,
        }
    }

    /// Identity of this host (`host:port`).
    pub fn id(&self) -> HostId {
        HostId::new(self.host.clone(), self.port)
    }
}

/// Identity of a cluster member: `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostId {
    host: String,
    port: u16,
}

impl HostId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        HostId {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Configuration for the client and its pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster members, in round-robin order.
    pub hosts: Vec<HostConfig>,
    /// Global connection cap across all hosts (0 = unlimited).
    pub max_total: usize,
    /// Open connections on demand (true) or pre-open up to capacity (false).
    pub lazy_connect: bool,
    /// Optional TCP connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Optional client-side deadline per operation.
    pub operation_timeout_ms: Option<u64>,
    /// Largest frame the decoder will accept.
    pub max_frame_len: u32,
    /// Disable Nagle on new sockets.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            hosts: vec![HostConfig::new("127.0.0.1", DEFAULT_PORT, 0)],
            max_total: 16,
            lazy_connect: true,
            connect_timeout_ms: None,
            operation_timeout_ms: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointing at a single host.
    pub fn single(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            hosts: vec![HostConfig::new(host, port, 0)],
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON; absent fields take defaults.
    pub fn from_json(json: &str) -> KvResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)
            .map_err(|err| KvError::Configuration(format!("invalid JSON config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can produce a working pool.
    pub fn validate(&self) -> KvResult<()> {
        if self.hosts.is_empty() {
            return Err(KvError::Configuration("no hosts configured".to_string()));
        }
        for (idx, host) in self.hosts.iter().enumerate() {
            if host.host.is_empty() {
                return Err(KvError::Configuration(format!("host #{} has an empty name", idx)));
            }
            if self.hosts[..idx].iter().any(|prev| prev.id() == host.id()) {
                return Err(KvError::Configuration(format!(
                    "host {} listed more than once",
                    host.id()
                )));
            }
        }
        if !self.lazy_connect && self.max_total == 0 {
            return Err(KvError::Configuration(
                "eager connect requires a finite max_total".to_string(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(KvError::Configuration("max_frame_len must be positive".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}
