use std::fmt::Write as _;
use std::time::Duration;
use chrono::{DateTime, Local, Utc};
use tracing::{error, warn};

use crate::errors::CycleError;
use crate::valuation::{Change, CycleReport};

const RULE_WIDTH: usize = 70;

/// Receives the outcome of every cycle; nothing flows back into the scheduler
pub trait CyclePresenter: Send + Sync {
    fn cycle_completed(&self, report: &CycleReport);
    fn cycle_deferred(&self, reason: &CycleError, retry_in: Duration);
    fn cycle_failed(&self, reason: &CycleError, next_in: Duration);
}

/// Prints reports and status lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }
}

impl CyclePresenter for ConsolePresenter {
    fn cycle_completed(&self, report: &CycleReport) {
        println!("{}", render_report(report));
    }

    fn cycle_deferred(&self, reason: &CycleError, retry_in: Duration) {
        warn!(%reason, retry_in_secs = retry_in.as_secs(), "Cycle deferred");
        println!("{}", status_line(reason, retry_in));
    }

    fn cycle_failed(&self, reason: &CycleError, next_in: Duration) {
        error!(%reason, next_in_secs = next_in.as_secs(), "Cycle failed");
        println!("{}", status_line(reason, next_in));
    }
}

/// Human-readable one-liner for a cycle that produced no report
pub fn status_line(reason: &CycleError, wait: Duration) -> String {
    let wait = format_wait(wait);
    match reason {
        CycleError::ConfigUnavailable(e) => format!("Token list not loaded ({}). Check the portfolio config. Retry in {}...", e, wait),
        CycleError::FeedUnavailable(e) => format!("ERROR API ({}). Retry in {}...", e, wait),
        CycleError::Storage(e) => format!("ERROR storage ({}). Cycle discarded, next update in {}...", e, wait),
        CycleError::Unexpected(e) => format!("ERROR cycle ({}). Next update in {}...", e, wait),
    }
}

fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{} s", secs)
    }
}

/// Stored UTC timestamps as shown to the user, in the local zone
pub fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The valuation table for one completed cycle
pub fn render_report(report: &CycleReport) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let currency = &report.snapshot.currency;
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(
        out,
        "{} | Update",
        local_time(report.snapshot.timestamp)
    );
    let _ = writeln!(out, "{}", rule);

    for symbol in &report.unresolved {
        let _ = writeln!(out, "Token {} not found!", symbol);
    }

    for obs in &report.observations {
        let _ = writeln!(
            out,
            "{}: {} | Price: {:.4} {} | Value: {:.2} {} | Change: {}",
            obs.symbol,
            obs.amount.normalize(),
            obs.price.round_dp(4),
            currency,
            obs.value.round_dp(2),
            currency,
            obs.price_change,
        );
    }

    let _ = writeln!(out, "{}", rule);
    let total_change = match report.snapshot.total_change {
        Change::Present(_) => format!(" ({})", report.snapshot.total_change),
        Change::Absent => String::new(),
    };
    let _ = writeln!(
        out,
        "TOTAL: {:.2} {}{}",
        report.snapshot.total_value.round_dp(2), currency, total_change
    );
    out
}
