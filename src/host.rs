//! Per-host monitoring state.
//!
//! A host is either *normal* or *in outage*. Failures accumulate in
//! `consecutive_failures`; only when the run reaches the configured threshold is an
//! outage opened, backdated to the first failure of the run. The next success closes
//! it. An outage still open at shutdown is closed as truncated.
//!
//! ```text
//! NORMAL --(failure, consecutive == threshold)--> IN_OUTAGE
//! IN_OUTAGE --(failure)--> IN_OUTAGE (missed updated)
//! IN_OUTAGE --(success)--> NORMAL (closed, recovered)
//! IN_OUTAGE --(shutdown)--> closed, truncated
//! ```

use chrono::{DateTime, Utc};

use crate::config::LatencyThresholds;
use crate::models::{
    ClosedOutage, HostEvent, HostSnapshot, HostSummary, LatencyClass, OutageEnd, OutageRecord,
    ProbeOutcome,
};
use crate::window::RollingWindow;

#[derive(Debug, Clone)]
pub struct HostState {
    host: String,
    outage_threshold: u32,
    latency: LatencyThresholds,
    total_success: u64,
    total_failure: u64,
    consecutive_failures: u32,
    streak_start: Option<DateTime<Utc>>,
    last_outcome: Option<ProbeOutcome>,
    window: RollingWindow,
    active_outage: Option<OutageRecord>,
}

impl HostState {
    pub fn new(
        host: impl Into<String>,
        outage_threshold: u32,
        window_capacity: usize,
        latency: LatencyThresholds,
    ) -> Self {
        Self {
            host: host.into(),
            outage_threshold: outage_threshold.max(1),
            latency,
            total_success: 0,
            total_failure: 0,
            consecutive_failures: 0,
            streak_start: None,
            last_outcome: None,
            window: RollingWindow::new(window_capacity),
            active_outage: None,
        }
    }

    /// Applies one probe outcome observed at `now`.
    pub fn record(&mut self, outcome: ProbeOutcome, now: DateTime<Utc>) -> Option<HostEvent> {
        let previous = self.last_outcome.replace(outcome);

        match outcome {
            ProbeOutcome::Success { .. } => {
                self.total_success += 1;
                self.consecutive_failures = 0;
                self.window.push(true);

                if !previous.is_some_and(|p| p.is_success()) {
                    self.streak_start = Some(now);
                }

                self.active_outage.take().map(|record| {
                    HostEvent::OutageClosed(ClosedOutage::from_record(record, now, OutageEnd::Recovered))
                })
            }
            ProbeOutcome::Failure => {
                self.total_failure += 1;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.window.push(false);

                if self.consecutive_failures == 1 {
                    self.streak_start = Some(now);
                }

                if let Some(outage) = self.active_outage.as_mut() {
                    outage.missed = self.consecutive_failures;
                    outage.last_failure = now;
                    return None;
                }

                if self.consecutive_failures == self.outage_threshold {
                    let record = OutageRecord {
                        host: self.host.clone(),
                        start: self.streak_start.unwrap_or(now),
                        missed: self.consecutive_failures,
                        last_failure: now,
                    };
                    self.active_outage = Some(record.clone());
                    return Some(HostEvent::OutageOpened(record));
                }
                None
            }
        }
    }

    /// Closes an open outage at `now` as truncated. Returns `None` on repeat calls.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<ClosedOutage> {
        self.active_outage
            .take()
            .map(|record| ClosedOutage::from_record(record, now, OutageEnd::Truncated))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn active_outage(&self) -> Option<&OutageRecord> {
        self.active_outage.as_ref()
    }

    pub fn is_in_outage(&self) -> bool {
        self.active_outage.is_some()
    }

    pub fn loss_percent(&self) -> f64 {
        self.window.loss_percent()
    }

    pub fn latency_class(&self) -> Option<LatencyClass> {
        self.last_outcome
            .as_ref()
            .map(|o| LatencyClass::classify(o, &self.latency))
    }

    /// Zero while failing or before the first probe.
    pub fn uptime_streak(&self, now: DateTime<Utc>) -> chrono::Duration {
        match (self.last_outcome, self.streak_start) {
            (Some(ProbeOutcome::Success { .. }), Some(start)) if now > start => now - start,
            _ => chrono::Duration::zero(),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> HostSnapshot {
        HostSnapshot {
            host: self.host.clone(),
            latency_class: self.latency_class(),
            last_latency_ms: match self.last_outcome {
                Some(ProbeOutcome::Success { latency_ms }) => Some(latency_ms),
                _ => None,
            },
            total_success: self.total_success,
            total_failure: self.total_failure,
            consecutive_failures: self.consecutive_failures,
            packet_loss: self.window.loss_percent(),
            uptime_streak_secs: self.uptime_streak(now).num_milliseconds() as f64 / 1000.0,
            in_outage: self.active_outage.is_some(),
        }
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            host: self.host.clone(),
            total_success: self.total_success,
            total_failure: self.total_failure,
            packet_loss: self.window.loss_percent(),
        }
    }
}
