use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;

/// Upper bound on probed endpoints after CIDR expansion.
pub const MAX_TARGETS: usize = 4096;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_hosts")]
    pub hosts: Vec<HostConfig>,
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_outage_threshold")]
    pub consecutive_failures_for_outage: u32,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_latency_good")]
    pub latency_good_ms: f64,
    #[serde(default = "default_latency_degraded")]
    pub latency_degraded_ms: f64,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_rotate_days")]
    pub log_rotate_days: u64,
    #[serde(default = "default_ui_refresh")]
    pub ui_refresh_ms: u64,
    #[serde(default = "default_connectivity_check")]
    pub connectivity_check_ms: u64,
    pub api_port: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    pub address: String,
    #[serde(default)]
    pub check: CheckType,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl HostConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            check: CheckType::Ping,
            interval_ms: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum CheckType {
    #[default]
    Ping,
    TcpPort { port: u16 },
}

/// A single probed endpoint, after CIDR expansion and default resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub check: CheckType,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Target {
    pub fn label(&self) -> String {
        match self.check {
            CheckType::Ping => self.address.clone(),
            CheckType::TcpPort { port } => format!("{}:{}", self.address, port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyThresholds {
    pub good_ms: f64,
    pub degraded_ms: f64,
}

impl Default for LatencyThresholds {
    fn default() -> Self {
        Self {
            good_ms: default_latency_good(),
            degraded_ms: default_latency_degraded(),
        }
    }
}

fn default_hosts() -> Vec<HostConfig> {
    ["8.8.8.8", "1.1.1.1", "9.9.9.9", "github.com", "aws.amazon.com"]
        .into_iter()
        .map(HostConfig::new)
        .collect()
}

fn default_interval() -> u64 { 3000 }
fn default_timeout() -> u64 { 1000 }
fn default_outage_threshold() -> u32 { 3 }
fn default_rolling_window() -> usize { 50 }
fn default_latency_good() -> f64 { 60.0 }
fn default_latency_degraded() -> f64 { 150.0 }
fn default_log_file() -> PathBuf { PathBuf::from("connection_down.log") }
fn default_log_rotate_days() -> u64 { 90 }
fn default_ui_refresh() -> u64 { 500 }
fn default_connectivity_check() -> u64 { 100 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            interval_ms: default_interval(),
            timeout_ms: default_timeout(),
            consecutive_failures_for_outage: default_outage_threshold(),
            rolling_window: default_rolling_window(),
            latency_good_ms: default_latency_good(),
            latency_degraded_ms: default_latency_degraded(),
            log_file: default_log_file(),
            log_rotate_days: default_log_rotate_days(),
            ui_refresh_ms: default_ui_refresh(),
            connectivity_check_ms: default_connectivity_check(),
            api_port: None,
        }
    }
}

impl MonitorConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        if self.consecutive_failures_for_outage == 0 {
            return Err(invalid("consecutive_failures_for_outage", "must be at least 1"));
        }
        if self.rolling_window == 0 {
            return Err(invalid("rolling_window", "must be at least 1"));
        }
        if self.ui_refresh_ms == 0 {
            return Err(invalid("ui_refresh_ms", "must be greater than 0"));
        }
        if self.connectivity_check_ms == 0 {
            return Err(invalid("connectivity_check_ms", "must be greater than 0"));
        }
        if self.latency_degraded_ms < self.latency_good_ms {
            return Err(invalid(
                "latency_degraded_ms",
                "must not be lower than latency_good_ms",
            ));
        }
        let mut total: u128 = 0;
        for host in &self.hosts {
            if host.address.trim().is_empty() {
                return Err(invalid("hosts.address", "must not be empty"));
            }
            total = total.saturating_add(address_count(&host.address));
            if total > MAX_TARGETS as u128 {
                return Err(ConfigError::InvalidValue {
                    field: "hosts.address",
                    reason: format!("expands to more than {} targets", MAX_TARGETS),
                });
            }
            if host.interval_ms.unwrap_or(self.interval_ms) == 0 {
                return Err(invalid("interval_ms", "must be greater than 0"));
            }
            if host.timeout_ms.unwrap_or(self.timeout_ms) == 0 {
                return Err(invalid("timeout_ms", "must be greater than 0"));
            }
        }
        Ok(())
    }

    pub fn latency_thresholds(&self) -> LatencyThresholds {
        LatencyThresholds {
            good_ms: self.latency_good_ms,
            degraded_ms: self.latency_degraded_ms,
        }
    }

    /// Expands CIDR addresses and applies per-host overrides. Duplicate labels keep
    /// the first occurrence.
    pub fn targets(&self) -> Vec<Target> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for host in &self.hosts {
            let addresses = if let Ok(net) = host.address.parse::<IpNet>() {
                net.hosts().map(|ip| ip.to_string()).collect::<Vec<_>>()
            } else {
                vec![host.address.trim().to_string()]
            };

            let interval = Duration::from_millis(host.interval_ms.unwrap_or(self.interval_ms));
            let timeout = Duration::from_millis(host.timeout_ms.unwrap_or(self.timeout_ms));
            if timeout > interval {
                warn!(address = %host.address, "Probe timeout exceeds interval; ticks will be delayed");
            }

            for address in addresses {
                let target = Target { address, check: host.check, interval, timeout };
                if seen.insert(target.label()) {
                    targets.push(target);
                } else {
                    warn!(target = %target.label(), "Duplicate target ignored");
                }
            }
        }
        targets
    }
}

/// Number of addresses an entry expands to. Upper bound, before deduplication.
fn address_count(address: &str) -> u128 {
    match address.parse::<IpNet>() {
        Ok(net) => {
            let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
            1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
        }
        Err(_) => 1,
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue { field, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = MonitorConfig::from_json("{}").unwrap();
        assert_eq!(config.hosts.len(), 5);
        assert_eq!(config.interval_ms, 3000);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.consecutive_failures_for_outage, 3);
        assert_eq!(config.rolling_window, 50);
        assert_eq!(config.log_file, PathBuf::from("connection_down.log"));
        assert!(config.api_port.is_none());
    }

    #[test]
    fn test_example_config_parses() {
        let config = MonitorConfig::from_json(include_str!("../config.example.json")).unwrap();
        assert_eq!(config.api_port, Some(3000));
        assert_eq!(config.targets().len(), 5);
    }

    #[test]
    fn test_empty_hosts_is_fatal() {
        let err = MonitorConfig::from_json(r#"{"hosts": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoHosts));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = MonitorConfig::from_json(r#"{"consecutive_failures_for_outage": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "consecutive_failures_for_outage", .. }));
    }

    #[test]
    fn test_inverted_latency_thresholds_rejected() {
        let err = MonitorConfig::from_json(r#"{"latency_good_ms": 200, "latency_degraded_ms": 100}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "latency_degraded_ms", .. }));
    }

    #[test]
    fn test_zero_values_rejected() {
        for (json, field) in [
            (r#"{"interval_ms": 0}"#, "interval_ms"),
            (r#"{"timeout_ms": 0}"#, "timeout_ms"),
            (r#"{"rolling_window": 0}"#, "rolling_window"),
            (r#"{"hosts": [{"address": "10.0.0.1", "interval_ms": 0}]}"#, "interval_ms"),
            (r#"{"hosts": [{"address": "10.0.0.1", "timeout_ms": 0}]}"#, "timeout_ms"),
        ] {
            match MonitorConfig::from_json(json) {
                Err(ConfigError::InvalidValue { field: f, .. }) => assert_eq!(f, field, "{}", json),
                other => panic!("{} was accepted: {:?}", json, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_oversized_networks_rejected() {
        for address in ["::/0", "fd00::/64", "10.0.0.0/8"] {
            let json = format!(r#"{{"hosts": [{{"address": "{}"}}]}}"#, address);
            let err = MonitorConfig::from_json(&json).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { field: "hosts.address", .. }), "{}", address);
        }
    }

    #[test]
    fn test_target_cap_applies_across_entries() {
        let mut config = MonitorConfig::default();
        config.hosts = vec![HostConfig::new("10.0.0.0/21"), HostConfig::new("10.1.0.0/21")];
        assert!(config.validate().is_ok());
        config.hosts.push(HostConfig::new("10.2.0.0/30"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_host_overrides() {
        let config = MonitorConfig::from_json(
            r#"{
                "interval_ms": 2000,
                "hosts": [
                    {"address": "example.com", "check": {"type": "TcpPort", "port": 443}, "timeout_ms": 250},
                    {"address": "10.0.0.1", "interval_ms": 500}
                ]
            }"#,
        )
        .unwrap();
        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].label(), "example.com:443");
        assert_eq!(targets[0].interval, Duration::from_millis(2000));
        assert_eq!(targets[0].timeout, Duration::from_millis(250));
        assert_eq!(targets[1].check, CheckType::Ping);
        assert_eq!(targets[1].interval, Duration::from_millis(500));
        assert_eq!(targets[1].timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_cidr_expansion_and_dedup() {
        let mut config = MonitorConfig::default();
        config.hosts = vec![HostConfig::new("192.168.1.0/30"), HostConfig::new("192.168.1.1")];
        let labels: Vec<_> = config.targets().iter().map(Target::label).collect();
        assert_eq!(labels, vec!["192.168.1.1", "192.168.1.2"]);
    }
}
