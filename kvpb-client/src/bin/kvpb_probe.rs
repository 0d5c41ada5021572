//! # Cluster Probe
//!
//! Purpose: Check that a cluster member answers over the protobuf protocol
//! and report round-trip latency.
//!
//! Usage: `kvpb-probe [host:port] [pings]`. Log verbosity follows `RUST_LOG`.

use std::env;
use std::time::Instant;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kvpb_client::{Client, ClientConfig, DEFAULT_PORT};

const DEFAULT_TARGET: &str = "127.0.0.1:8087";
const DEFAULT_PINGS: usize = 10;

struct ProbeConfig {
    host: String,
    port: u16,
    pings: usize,
}

impl ProbeConfig {
    fn from_args() -> anyhow::Result<Self> {
        let mut args = env::args().skip(1);
        let target = args.next().unwrap_or_else(|| DEFAULT_TARGET.to_string());
        let pings = parse_usize(args.next(), DEFAULT_PINGS);

        let (host, port) = match target.rsplit_once(':') {
            Some((host, port)) => (
                host.to_string(),
                port.parse()
                    .with_context(|| format!("invalid port in {}", target))?,
            ),
            None => (target, DEFAULT_PORT),
        };
        if host.is_empty() {
            bail!("empty host name");
        }

        Ok(ProbeConfig { host, port, pings })
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let probe = ProbeConfig::from_args()?;
    let client = Client::connect(ClientConfig::single(probe.host.clone(), probe.port))
        .await
        .context("failed to build client")?;

    let mut total_us = 0u128;
    let mut max_us = 0u128;
    for _ in 0..probe.pings {
        let start = Instant::now();
        client
            .ping()
            .await
            .with_context(|| format!("ping {}:{}", probe.host, probe.port))?;
        let elapsed = start.elapsed().as_micros();
        total_us += elapsed;
        max_us = max_us.max(elapsed);
    }
    if probe.pings > 0 {
        info!(
            pings = probe.pings,
            avg_us = total_us / probe.pings as u128,
            max_us,
            "ping round trips"
        );
    }

    let info = client.server_info().await.context("server info")?;
    info!(
        node = %String::from_utf8_lossy(info.node.as_deref().unwrap_or_default()),
        version = %String::from_utf8_lossy(info.server_version.as_deref().unwrap_or_default()),
        "server identified"
    );

    let buckets = client.list_buckets().await.context("list buckets")?;
    info!(count = buckets.len(), "buckets listed");

    client.close();
    Ok(())
}
