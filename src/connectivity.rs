//! Global connectivity across all hosts.
//!
//! The connection counts as down only while every host is failing. Uptime streaks
//! and global outages alternate, and the longest of each is remembered.

use chrono::{DateTime, Duration, Utc};

use crate::models::ConnectivitySnapshot;
use crate::sink::{format_timestamp, TRUNCATED_MARKER};

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivityEvent {
    OutageStarted { at: DateTime<Utc> },
    OutageEnded { start: DateTime<Utc>, end: DateTime<Utc>, truncated: bool },
    LongestUptime { duration: Duration, at: DateTime<Utc> },
    LongestOutage { duration: Duration, at: DateTime<Utc> },
}

impl ConnectivityEvent {
    pub fn log_line(&self) -> String {
        match self {
            ConnectivityEvent::OutageStarted { at } => {
                format!("{} | GLOBAL_OUTAGE_START", format_timestamp(*at))
            }
            ConnectivityEvent::OutageEnded { start, end, truncated } => {
                let mut line = format!(
                    "{} -> {} | GLOBAL_OUTAGE_END duration={}s",
                    format_timestamp(*start),
                    format_timestamp(*end),
                    (*end - *start).num_seconds().max(0)
                );
                if *truncated {
                    line.push_str(TRUNCATED_MARKER);
                }
                line
            }
            ConnectivityEvent::LongestUptime { duration, at } => format!(
                "{} | NEW_LONGEST_UPTIME duration={}s",
                format_timestamp(*at),
                duration.num_seconds()
            ),
            ConnectivityEvent::LongestOutage { duration, at } => format!(
                "{} | NEW_LONGEST_OUTAGE duration={}s",
                format_timestamp(*at),
                duration.num_seconds()
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityTracker {
    uptime_start: Option<DateTime<Utc>>,
    outage_start: Option<DateTime<Utc>>,
    longest_uptime: Duration,
    longest_uptime_ended: Option<DateTime<Utc>>,
    longest_outage: Duration,
    longest_outage_ended: Option<DateTime<Utc>>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the current all-hosts-down verdict. Events are returned in log order.
    pub fn observe(&mut self, all_down: bool, now: DateTime<Utc>) -> Vec<ConnectivityEvent> {
        let mut events = Vec::new();

        if all_down {
            if let Some(start) = self.uptime_start.take() {
                let duration = now - start;
                if duration > self.longest_uptime {
                    self.longest_uptime = duration;
                    self.longest_uptime_ended = Some(now);
                    events.push(ConnectivityEvent::LongestUptime { duration, at: now });
                }
            }
            if self.outage_start.is_none() {
                self.outage_start = Some(now);
                events.push(ConnectivityEvent::OutageStarted { at: now });
            }
        } else {
            if let Some(start) = self.outage_start.take() {
                events.push(ConnectivityEvent::OutageEnded { start, end: now, truncated: false });
                let duration = now - start;
                if duration > self.longest_outage {
                    self.longest_outage = duration;
                    self.longest_outage_ended = Some(now);
                    events.push(ConnectivityEvent::LongestOutage { duration, at: now });
                }
            }
            if self.uptime_start.is_none() {
                self.uptime_start = Some(now);
            }
        }
        events
    }

    /// Closes a global outage still open at shutdown.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<ConnectivityEvent> {
        self.outage_start
            .take()
            .map(|start| ConnectivityEvent::OutageEnded { start, end: now, truncated: true })
    }

    pub fn is_online(&self) -> bool {
        self.outage_start.is_none()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ConnectivitySnapshot {
        let since = |start: Option<DateTime<Utc>>| {
            start.map_or(0.0, |s| (now - s).num_milliseconds().max(0) as f64 / 1000.0)
        };
        let online = self.is_online();
        ConnectivitySnapshot {
            online,
            current_secs: if online { since(self.uptime_start) } else { since(self.outage_start) },
            longest_uptime_secs: self.longest_uptime.num_milliseconds() as f64 / 1000.0,
            longest_uptime_ended: self.longest_uptime_ended,
            longest_outage_secs: self.longest_outage.num_milliseconds() as f64 / 1000.0,
            longest_outage_ended: self.longest_outage_ended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_full_cycle() {
        let mut tracker = ConnectivityTracker::new();
        assert!(tracker.observe(false, t(0)).is_empty());
        assert!(tracker.observe(false, t(5)).is_empty());

        let events = tracker.observe(true, t(30));
        assert_eq!(
            events,
            vec![
                ConnectivityEvent::LongestUptime { duration: Duration::seconds(30), at: t(30) },
                ConnectivityEvent::OutageStarted { at: t(30) },
            ]
        );
        assert!(tracker.observe(true, t(31)).is_empty());
        assert!(!tracker.is_online());

        let events = tracker.observe(false, t(40));
        assert_eq!(
            events,
            vec![
                ConnectivityEvent::OutageEnded { start: t(30), end: t(40), truncated: false },
                ConnectivityEvent::LongestOutage { duration: Duration::seconds(10), at: t(40) },
            ]
        );

        let snap = tracker.snapshot(t(45));
        assert!(snap.online);
        assert_eq!(snap.current_secs, 5.0);
        assert_eq!(snap.longest_uptime_secs, 30.0);
        assert_eq!(snap.longest_outage_secs, 10.0);
        assert_eq!(snap.longest_outage_ended, Some(t(40)));
    }

    #[test]
    fn test_shorter_streak_is_not_a_record() {
        let mut tracker = ConnectivityTracker::new();
        tracker.observe(false, t(0));
        tracker.observe(true, t(60));
        tracker.observe(false, t(61));
        let events = tracker.observe(true, t(70));
        assert_eq!(events, vec![ConnectivityEvent::OutageStarted { at: t(70) }]);
    }

    #[test]
    fn test_finalize_truncates_open_outage_once() {
        let mut tracker = ConnectivityTracker::new();
        tracker.observe(true, t(0));
        let event = tracker.finalize(t(12)).unwrap();
        assert!(event.log_line().ends_with("GLOBAL_OUTAGE_END duration=12s [truncated]"));
        assert_eq!(tracker.finalize(t(13)), None);
    }

    #[test]
    fn test_log_lines() {
        let ts = |secs| format_timestamp(t(secs));

        let started = ConnectivityEvent::OutageStarted { at: t(30) };
        assert_eq!(started.log_line(), format!("{} | GLOBAL_OUTAGE_START", ts(30)));

        let ended = ConnectivityEvent::OutageEnded { start: t(30), end: t(40), truncated: false };
        assert_eq!(
            ended.log_line(),
            format!("{} -> {} | GLOBAL_OUTAGE_END duration=10s", ts(30), ts(40))
        );

        let uptime = ConnectivityEvent::LongestUptime { duration: Duration::seconds(30), at: t(30) };
        assert_eq!(uptime.log_line(), format!("{} | NEW_LONGEST_UPTIME duration=30s", ts(30)));

        let outage = ConnectivityEvent::LongestOutage { duration: Duration::seconds(10), at: t(40) };
        assert_eq!(outage.log_line(), format!("{} | NEW_LONGEST_OUTAGE duration=10s", ts(40)));
    }
}
