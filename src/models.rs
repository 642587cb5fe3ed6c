use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LatencyThresholds;

/// Result of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Success { latency_ms: f64 },
    Failure,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyClass {
    Good,
    Degraded,
    Poor,
    Down,
}

impl LatencyClass {
    pub fn classify(outcome: &ProbeOutcome, thresholds: &LatencyThresholds) -> Self {
        match *outcome {
            ProbeOutcome::Failure => LatencyClass::Down,
            ProbeOutcome::Success { latency_ms } if latency_ms < thresholds.good_ms => {
                LatencyClass::Good
            }
            ProbeOutcome::Success { latency_ms } if latency_ms <= thresholds.degraded_ms => {
                LatencyClass::Degraded
            }
            ProbeOutcome::Success { .. } => LatencyClass::Poor,
        }
    }
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LatencyClass::Good => "good",
            LatencyClass::Degraded => "degraded",
            LatencyClass::Poor => "poor",
            LatencyClass::Down => "down",
        };
        f.write_str(s)
    }
}

/// An outage that is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    pub host: String,
    /// Time of the first failure of the run, not the moment the threshold was hit.
    pub start: DateTime<Utc>,
    pub missed: u32,
    pub last_failure: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutageEnd {
    Recovered,
    /// Still open at shutdown; `end` is the shutdown time.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedOutage {
    pub host: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub missed: u32,
    pub kind: OutageEnd,
}

impl ClosedOutage {
    pub fn from_record(record: OutageRecord, end: DateTime<Utc>, kind: OutageEnd) -> Self {
        Self {
            host: record.host,
            start: record.start,
            end,
            missed: record.missed,
            kind,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn is_truncated(&self) -> bool {
        self.kind == OutageEnd::Truncated
    }
}

/// Outage lifecycle transition produced by a single state update.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    OutageOpened(OutageRecord),
    OutageClosed(ClosedOutage),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub host: String,
    pub latency_class: Option<LatencyClass>,
    pub last_latency_ms: Option<f64>,
    pub total_success: u64,
    pub total_failure: u64,
    pub consecutive_failures: u32,
    pub packet_loss: f64,
    pub uptime_streak_secs: f64,
    pub in_outage: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ConnectivitySnapshot {
    pub online: bool,
    /// Length of the current uptime streak, or of the current outage when offline.
    pub current_secs: f64,
    pub longest_uptime_secs: f64,
    pub longest_uptime_ended: Option<DateTime<Utc>>,
    pub longest_outage_secs: f64,
    pub longest_outage_ended: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub taken_at: DateTime<Utc>,
    pub hosts: Vec<HostSnapshot>,
    pub connectivity: ConnectivitySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub total_success: u64,
    pub total_failure: u64,
    pub packet_loss: f64,
}

impl fmt::Display for HostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: success={} fail={} packet_loss={:.1}%",
            self.host, self.total_success, self.total_failure, self.packet_loss
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub hosts: Vec<HostSummary>,
    pub truncated_outages: usize,
}
