use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{MonitorConfig, Target};
use crate::connectivity::{ConnectivityEvent, ConnectivityTracker};
use crate::error::ConfigError;
use crate::host::HostState;
use crate::models::{DashboardSnapshot, HostEvent, ProbeOutcome, Summary};
use crate::prober::Prober;
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::sink::OutageSink;

/// Extra time granted to a probe beyond its own timeout before the loop gives up on it.
const PROBE_GRACE: Duration = Duration::from_millis(500);

struct HostCell {
    target: Target,
    label: String,
    state: RwLock<HostState>,
}

pub struct Monitor {
    hosts: Vec<Arc<HostCell>>,
    connectivity: RwLock<ConnectivityTracker>,
    connectivity_interval: Duration,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn OutageSink>,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    summary: OnceCell<Summary>,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn OutageSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let targets = config.targets();
        if targets.is_empty() {
            return Err(ConfigError::NoHosts);
        }

        let latency = config.latency_thresholds();
        let hosts = targets
            .into_iter()
            .map(|target| {
                let label = target.label();
                let state = HostState::new(
                    label.clone(),
                    config.consecutive_failures_for_outage,
                    config.rolling_window,
                    latency,
                );
                Arc::new(HostCell { target, label, state: RwLock::new(state) })
            })
            .collect();

        Ok(Self {
            hosts,
            connectivity: RwLock::new(ConnectivityTracker::new()),
            connectivity_interval: Duration::from_millis(config.connectivity_check_ms),
            prober,
            sink,
            clock,
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            summary: OnceCell::new(),
        })
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawns one probe loop per host plus the connectivity loop. Only the first call
    /// has any effect.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Monitor already started");
            return;
        }
        info!(hosts = self.hosts.len(), "Monitor starting");

        let mut tasks = self.tasks.lock();
        for cell in &self.hosts {
            let monitor = Arc::clone(self);
            let cell = Arc::clone(cell);
            let signal = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                monitor.run_host(cell, signal).await;
            }));
        }

        let monitor = Arc::clone(self);
        let signal = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            monitor.run_connectivity(signal).await;
        }));
    }

    async fn run_host(&self, cell: Arc<HostCell>, mut signal: ShutdownSignal) {
        let target = &cell.target;
        info!(
            host = %cell.label,
            interval_ms = target.interval.as_millis() as u64,
            timeout_ms = target.timeout.as_millis() as u64,
            "Host loop started"
        );

        let mut ticker = time::interval(target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = signal.triggered() => break,
                _ = ticker.tick() => {}
            }

            let probe = time::timeout(
                target.timeout + PROBE_GRACE,
                self.prober.probe(target, target.timeout),
            );
            let outcome = tokio::select! {
                biased;
                _ = signal.triggered() => break,
                result = probe => result.unwrap_or_else(|_| {
                    warn!(host = %cell.label, "Prober overran its timeout");
                    ProbeOutcome::Failure
                }),
            };

            self.apply(&cell, outcome);
        }

        debug!(host = %cell.label, "Host loop stopped");
    }

    fn apply(&self, cell: &HostCell, outcome: ProbeOutcome) {
        let now = self.clock.now();
        let event = cell.state.write().record(outcome, now);

        match event {
            Some(HostEvent::OutageOpened(record)) => {
                warn!(
                    host = %record.host,
                    missed = record.missed,
                    since = %record.start,
                    "Outage started"
                );
                if let Err(e) = self.sink.outage_opened(&record) {
                    error!(host = %record.host, error = %e, "Failed to record outage start");
                }
            }
            Some(HostEvent::OutageClosed(outage)) => {
                info!(
                    host = %outage.host,
                    missed = outage.missed,
                    duration_secs = outage.duration().num_seconds(),
                    "Outage ended"
                );
                if let Err(e) = self.sink.outage_closed(&outage) {
                    error!(host = %outage.host, error = %e, "Failed to write outage log");
                }
            }
            None => {}
        }
    }

    async fn run_connectivity(&self, mut signal: ShutdownSignal) {
        let mut ticker = time::interval(self.connectivity_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = signal.triggered() => break,
                _ = ticker.tick() => self.check_connectivity(),
            }
        }
    }

    fn check_connectivity(&self) {
        let all_down = self
            .hosts
            .iter()
            .all(|cell| cell.state.read().consecutive_failures() > 0);
        let events = self.connectivity.write().observe(all_down, self.clock.now());
        for event in events {
            self.record_connectivity(&event);
        }
    }

    fn record_connectivity(&self, event: &ConnectivityEvent) {
        match event {
            ConnectivityEvent::OutageStarted { .. } => error!("All hosts unreachable"),
            ConnectivityEvent::OutageEnded { .. } => warn!("Connectivity restored"),
            _ => {}
        }
        if let Err(e) = self.sink.connectivity(event) {
            error!(error = %e, "Failed to write connectivity log");
        }
    }

    /// Point-in-time copy of every host's state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let now = self.clock.now();
        DashboardSnapshot {
            taken_at: now,
            hosts: self.hosts.iter().map(|cell| cell.state.read().snapshot(now)).collect(),
            connectivity: self.connectivity.read().snapshot(now),
        }
    }

    /// Stops every loop, truncates open outages and returns the final summary.
    /// Concurrent and later callers all receive the summary of the first shutdown.
    pub async fn shutdown(&self) -> Summary {
        self.summary.get_or_init(|| self.stop_and_finalize()).await.clone()
    }

    async fn stop_and_finalize(&self) -> Summary {
        if self.shutdown.trigger() {
            info!("Shutdown requested, stopping host loops");
        }

        let mut handles: Vec<_> = self.tasks.lock().drain(..).collect();
        let grace = self
            .hosts
            .iter()
            .map(|cell| cell.target.timeout)
            .max()
            .unwrap_or_default()
            + PROBE_GRACE;

        if time::timeout(grace, join_all(handles.iter_mut())).await.is_err() {
            warn!("Loops did not stop within grace period, aborting");
            for handle in handles.into_iter().filter(|h| !h.is_finished()) {
                handle.abort();
                let _ = handle.await;
            }
        }

        let now = self.clock.now();
        let mut truncated = 0;
        for cell in &self.hosts {
            let closed = cell.state.write().finalize(now);
            if let Some(outage) = closed {
                truncated += 1;
                warn!(host = %outage.host, missed = outage.missed, "Outage truncated at shutdown");
                if let Err(e) = self.sink.outage_closed(&outage) {
                    error!(host = %outage.host, error = %e, "Failed to write outage log");
                }
            }
        }
        let global = self.connectivity.write().finalize(now);
        if let Some(event) = global {
            self.record_connectivity(&event);
        }

        Summary {
            hosts: self.hosts.iter().map(|cell| cell.state.read().summary()).collect(),
            truncated_outages: truncated,
        }
    }
}
