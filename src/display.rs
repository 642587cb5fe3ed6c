//! Live terminal table.

use chrono::Local;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{style, Color, Stylize};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;

use crate::engine::Monitor;
use crate::models::{DashboardSnapshot, HostSnapshot, LatencyClass};
use crate::shutdown::ShutdownSignal;
use crate::sink::LOG_TIME_FORMAT;
use crate::utils::format_duration;

const COLUMNS: [(&str, usize); 9] = [
    ("Host", 24),
    ("Status", 10),
    ("RTT (ms)", 9),
    ("Latency", 9),
    ("Success", 8),
    ("Fail", 6),
    ("Consec Fail", 12),
    ("Packet Loss %", 14),
    ("Streak", 8),
];

pub fn header_line(snapshot: &DashboardSnapshot) -> String {
    let c = &snapshot.connectivity;
    if c.online {
        format!("ONLINE - Uptime for {}", format_duration(c.current_secs))
    } else {
        format!("OFFLINE - Outage for {}", format_duration(c.current_secs))
    }
}

fn row_cells(host: &HostSnapshot) -> [String; 9] {
    let status = if host.consecutive_failures == 0 {
        "OK".to_string()
    } else {
        format!("DOWN ({})", host.consecutive_failures)
    };
    [
        host.host.clone(),
        status,
        host.last_latency_ms.map_or("-".into(), |ms| format!("{:.1}", ms)),
        host.latency_class.map_or("-".into(), |c| c.to_string()),
        host.total_success.to_string(),
        host.total_failure.to_string(),
        host.consecutive_failures.to_string(),
        format!("{:.0}", host.packet_loss),
        format_duration(host.uptime_streak_secs),
    ]
}

fn join_cells<S: AsRef<str>>(cells: &[S]) -> String {
    cells
        .iter()
        .zip(COLUMNS.iter())
        .map(|(cell, (_, width))| format!("{:<width$}", cell.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

/// Plain-text table rows: column header, one line per host, then the caption.
pub fn table_lines(snapshot: &DashboardSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.hosts.len() + 4);
    let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
    lines.push(join_cells(&names));
    for host in &snapshot.hosts {
        lines.push(join_cells(&row_cells(host)));
    }

    let c = &snapshot.connectivity;
    let record = |secs: f64, ended: Option<chrono::DateTime<chrono::Utc>>| match ended {
        Some(at) => format!(
            "{} (ended on {})",
            format_duration(secs),
            at.with_timezone(&Local).format(LOG_TIME_FORMAT)
        ),
        None => "-".to_string(),
    };
    lines.push(format!("Longest Uptime: {}", record(c.longest_uptime_secs, c.longest_uptime_ended)));
    lines.push(format!("Longest Outage: {}", record(c.longest_outage_secs, c.longest_outage_ended)));
    lines
}

fn row_color(host: &HostSnapshot) -> Color {
    match host.latency_class {
        Some(LatencyClass::Good) => Color::Green,
        Some(LatencyClass::Degraded) => Color::Yellow,
        Some(LatencyClass::Poor) => Color::Red,
        Some(LatencyClass::Down) => Color::DarkRed,
        None => Color::Grey,
    }
}

pub fn render<W: Write>(out: &mut W, snapshot: &DashboardSnapshot) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    let header = header_line(snapshot);
    let header = if snapshot.connectivity.online { style(header).green() } else { style(header).red() };
    write!(out, "{}\r\n\r\n", header.bold())?;

    let lines = table_lines(snapshot);
    let (columns, rest) = lines.split_at(1);
    let (rows, caption) = rest.split_at(snapshot.hosts.len());

    write!(out, "{}\r\n", style(&columns[0]).bold())?;
    for (line, host) in rows.iter().zip(&snapshot.hosts) {
        write!(out, "{}\r\n", style(line).with(row_color(host)))?;
    }
    write!(out, "\r\n")?;
    for line in caption {
        write!(out, "{}\r\n", style(line).bold())?;
    }
    out.flush()
}

/// Redraws the table at a fixed cadence until shutdown.
pub async fn run_presenter(monitor: Arc<Monitor>, refresh: Duration, mut signal: ShutdownSignal) {
    let mut ticker = time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            biased;
            _ = signal.triggered() => break,
            _ = ticker.tick() => {
                if let Err(e) = render(&mut stdout, &monitor.snapshot()) {
                    warn!(error = %e, "Failed to render dashboard");
                }
            }
        }
    }
}
