//! Host name resolution.
//!
//! The pool resolves `(host, port)` through a [`Resolver`] so tests can swap
//! in a double that never touches DNS.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;

use kvpb_common::{KvError, KvResult};

/// Turns a `(host, port)` pair into a concrete socket address.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    async fn resolve(&self, host: &str, port: u16) -> KvResult<SocketAddr>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> KvResult<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|err| KvError::DnsResolution {
                host: host.to_string(),
                port,
                reason: err.to_string(),
            })?;

        addrs.next().ok_or_else(|| KvError::DnsResolution {
            host: host.to_string(),
            port,
            reason: "no addresses returned".to_string(),
        })
    }
}

/// Fixed name table; unknown names fail with `DnsResolution`.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<(String, u16), SocketAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `host:port` to `addr`.
    pub fn with_entry(mut self, host: impl Into<String>, port: u16, addr: SocketAddr) -> Self {
        self.entries.insert((host.into(), port), addr);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> KvResult<SocketAddr> {
        self.entries
            .get(&(host.to_string(), port))
            .copied()
            .ok_or_else(|| KvError::DnsResolution {
                host: host.to_string(),
                port,
                reason: "no static entry".to_string(),
            })
    }
}
