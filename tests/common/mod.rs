//! Shared fakes for monitor integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netpulse::clock::Clock;
use netpulse::config::{HostConfig, MonitorConfig, Target};
use netpulse::connectivity::ConnectivityEvent;
use netpulse::error::SinkError;
use netpulse::models::{ClosedOutage, OutageRecord, ProbeOutcome};
use netpulse::prober::Prober;
use netpulse::sink::OutageSink;

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Step {
    Up(f64),
    Down,
    /// Waits out the probe timeout, then fails.
    Timeout,
    /// Never returns.
    Stall,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    then: Option<Step>,
}

/// Plays back a per-host sequence of probe results.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, Arc<AtomicUsize>>>,
}

#[allow(dead_code)]
impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, host: &str, steps: Vec<Step>, then: Step) -> Self {
        self.scripts.lock().insert(
            host.to_string(),
            Script { steps: steps.into(), then: Some(then) },
        );
        self
    }

    pub fn calls(&self, host: &str) -> usize {
        self.counter(host).load(Ordering::SeqCst)
    }

    fn counter(&self, host: &str) -> Arc<AtomicUsize> {
        self.calls.lock().entry(host.to_string()).or_default().clone()
    }

    fn next_step(&self, host: &str) -> Step {
        let mut scripts = self.scripts.lock();
        let script = scripts.entry(host.to_string()).or_default();
        script.steps.pop_front().or(script.then).unwrap_or(Step::Down)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeOutcome {
        let host = target.label();
        self.counter(&host).fetch_add(1, Ordering::SeqCst);
        match self.next_step(&host) {
            Step::Up(latency_ms) => ProbeOutcome::Success { latency_ms },
            Step::Down => ProbeOutcome::Failure,
            Step::Timeout => {
                tokio::time::sleep(timeout).await;
                ProbeOutcome::Failure
            }
            Step::Stall => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub opened: Mutex<Vec<OutageRecord>>,
    pub closed: Mutex<Vec<ClosedOutage>>,
    pub connectivity: Mutex<Vec<ConnectivityEvent>>,
}

impl OutageSink for RecordingSink {
    fn outage_opened(&self, outage: &OutageRecord) -> Result<(), SinkError> {
        self.opened.lock().push(outage.clone());
        Ok(())
    }

    fn outage_closed(&self, outage: &ClosedOutage) -> Result<(), SinkError> {
        self.closed.lock().push(outage.clone());
        Ok(())
    }

    fn connectivity(&self, event: &ConnectivityEvent) -> Result<(), SinkError> {
        self.connectivity.lock().push(event.clone());
        Ok(())
    }
}

/// Sink whose every write fails.
#[allow(dead_code)]
pub struct FailingSink;

impl OutageSink for FailingSink {
    fn outage_closed(&self, _outage: &ClosedOutage) -> Result<(), SinkError> {
        Err(SinkError::Io {
            path: "/dev/full".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

/// Wall clock derived from tokio's (possibly paused) time.
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { base: epoch(), origin: tokio::time::Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.origin.elapsed()).unwrap()
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    epoch() + chrono::Duration::seconds(secs)
}

/// Config with the given hosts, each probed every `interval_ms`.
pub fn config(hosts: &[&str], interval_ms: u64, timeout_ms: u64) -> MonitorConfig {
    MonitorConfig {
        hosts: hosts.iter().map(|h| HostConfig::new(*h)).collect(),
        interval_ms,
        timeout_ms,
        ..MonitorConfig::default()
    }
}
