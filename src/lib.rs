//! Per-host reachability monitor.
//!
//! ```text
//! per host:   interval tick → Prober → HostState ─┬→ OutageSink (closed/truncated)
//!                                                 └→ snapshot ← display / api
//! all hosts:  connectivity tick → ConnectivityTracker → OutageSink
//! ```
//!
//! Each host's state is written only by its own task and read through short
//! per-host locks, so a slow or hung host never delays the others.

pub mod api;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod display;
pub mod engine;
pub mod error;
pub mod host;
pub mod models;
pub mod prober;
pub mod shutdown;
pub mod sink;
pub mod utils;
pub mod window;
