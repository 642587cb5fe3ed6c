use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::{CheckType, Target};
use crate::models::ProbeOutcome;

/// Executes a single reachability check. Implementations must return within
/// `timeout`; every error is reported as [`ProbeOutcome::Failure`].
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeOutcome;
}

pub struct NetworkProber {
    ping_v4: PingClient,
    ping_v6: Option<PingClient>,
    dns_resolver: TokioResolver,
}

impl NetworkProber {
    pub fn new() -> Result<Self> {
        let ping_v4 = PingClient::new(&PingConfig::default())
            .context("Failed to create ICMPv4 client")?;

        let ping_v6 = match PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                info!(error = %e, "ICMPv6 unavailable; IPv6 targets will report failures");
                None
            }
        };

        let dns_resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();

        info!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");

        Ok(Self { ping_v4, ping_v6, dns_resolver })
    }

    async fn check(&self, target: &Target, timeout: Duration) -> Result<f64, String> {
        let ip = self.resolve(&target.address).await?;
        match target.check {
            CheckType::Ping => self.check_ping(ip, timeout).await,
            CheckType::TcpPort { port } => Self::check_tcp(SocketAddr::new(ip, port)).await,
        }
    }

    async fn check_ping(&self, ip: IpAddr, timeout: Duration) -> Result<f64, String> {
        let client = match ip {
            IpAddr::V4(_) => &self.ping_v4,
            IpAddr::V6(_) => self.ping_v6.as_ref().ok_or("ICMPv6 client unavailable")?,
        };

        let payload = [0u8; 56];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(0), &payload).await {
            Ok((_, rtt)) => Ok(rtt.as_secs_f64() * 1000.0),
            Err(e) => Err(format!("ICMP: {}", e)),
        }
    }

    async fn check_tcp(addr: SocketAddr) -> Result<f64, String> {
        let start = Instant::now();
        match TcpStream::connect(addr).await {
            Ok(_) => Ok(start.elapsed().as_secs_f64() * 1000.0),
            Err(e) => Err(format!("Connection refused: {}", e)),
        }
    }

    async fn resolve(&self, address: &str) -> Result<IpAddr, String> {
        if let Ok(ip) = address.parse::<IpAddr>() { return Ok(ip); }
        match self.dns_resolver.lookup_ip(address).await {
            Ok(lookup) => lookup.iter().next().ok_or_else(|| "No IP address found".into()),
            Err(e) => Err(format!("DNS resolution failed: {}", e)),
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeOutcome {
        match tokio::time::timeout(timeout, self.check(target, timeout)).await {
            Ok(Ok(latency_ms)) => ProbeOutcome::Success { latency_ms },
            Ok(Err(reason)) => {
                debug!(target = %target.label(), %reason, "Probe failed");
                ProbeOutcome::Failure
            }
            Err(_) => {
                debug!(target = %target.label(), "Probe timed out");
                ProbeOutcome::Failure
            }
        }
    }
}
