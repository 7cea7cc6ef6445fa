//! Gateway last-seen evaluation.
//!
//! A check fetches the gateway's connection stats, takes the most recent
//! of its status and uplink timestamps, and grades the time elapsed since
//! then against the warning and critical thresholds:
//!
//! | elapsed                         | status   |
//! |---------------------------------|----------|
//! | negative                        | UNKNOWN  |
//! | `< warning`                     | OK       |
//! | `warning ..= critical`          | WARNING  |
//! | `> critical`                    | CRITICAL |
//!
//! Reaching the warning threshold warns; only exceeding the critical
//! threshold is critical. Thresholds need not be ordered: with
//! `warning > critical`, anything under warning is OK, then anything over
//! critical is CRITICAL, and the rest warns.

use std::fmt;
use std::process::ExitCode;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, instrument};

use crate::client::StatusClient;
use crate::error::{Error, Result};
use crate::metrics;

/// Plugin status, with the exit code a Nagios-style supervisor expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Status {
    pub fn exit_code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status.exit_code())
    }
}

/// Warning and critical ages, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    warning: u32,
    critical: u32,
}

impl Thresholds {
    pub fn new(warning: u32, critical: u32) -> Self {
        Self { warning, critical }
    }

    fn warning_delta(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.warning))
    }

    fn critical_delta(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.critical))
    }
}

/// Outcome of one check: the status plus the line printed for the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    pub message: String,
    perfdata: Option<String>,
}

impl Verdict {
    pub fn from_error(err: &Error) -> Self {
        let status = err.status();
        Self {
            status,
            message: format!("{}: {err}", status.label()),
            perfdata: None,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.status.into()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.perfdata {
            Some(perf) => write!(f, "{} | {perf}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Grade the age of `last_seen` as observed at `now`.
pub fn classify(
    last_seen: DateTime<Utc>,
    now: DateTime<Utc>,
    thresholds: Thresholds,
) -> Result<Verdict> {
    let diff = now - last_seen;
    debug!(diff_ms = diff.num_milliseconds(), "Computed time since last seen");

    if diff < TimeDelta::zero() {
        return Err(Error::LastSeenInFuture {
            last_seen,
            ahead: -diff,
        });
    }

    let secs = diff.num_seconds();
    let (status, message) = if diff < thresholds.warning_delta() {
        (Status::Ok, format!("OK: Last seen {secs} seconds ago"))
    } else if diff > thresholds.critical_delta() {
        (Status::Critical, format!("CRITICAL: Not seen for {secs} seconds."))
    } else {
        (Status::Warning, format!("WARNING: Not seen for {secs} seconds."))
    };

    Ok(Verdict {
        status,
        message,
        perfdata: Some(format!(
            "last_seen={secs}s;{};{};0",
            thresholds.warning, thresholds.critical
        )),
    })
}

/// Run the check for `gateway_id`. Every failure is folded into the verdict.
#[instrument(skip(client))]
pub async fn evaluate(client: &StatusClient, gateway_id: &str, thresholds: Thresholds) -> Verdict {
    let verdict = match check_gateway(client, gateway_id, thresholds).await {
        Ok(verdict) => verdict,
        Err(err) => {
            error!(error = %err, gateway = %gateway_id, "Check failed");
            Verdict::from_error(&err)
        }
    };
    metrics::record_verdict(verdict.status);
    verdict
}

async fn check_gateway(
    client: &StatusClient,
    gateway_id: &str,
    thresholds: Thresholds,
) -> Result<Verdict> {
    let stats = client.fetch_status(gateway_id).await?;
    debug!(
        last_status = ?stats.last_status_received_at,
        last_uplink = ?stats.last_uplink_received_at,
        "Fetched gateway stats"
    );
    let last_seen = stats
        .last_seen()
        .ok_or_else(|| Error::NeverSeen(gateway_id.to_string()))?;

    let now = Utc::now();
    let verdict = classify(last_seen, now, thresholds)?;
    if let Ok(age) = (now - last_seen).to_std() {
        metrics::record_last_seen_age(age);
    }
    Ok(verdict)
}
