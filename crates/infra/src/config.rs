//! Worker configuration from environment variables.
//!
//! Every setting has a development default; a warning is logged whenever one is
//! used. Values that are present but unparseable are an error.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::tasks::TaskKind;

pub const GRAPHQL_URL_ENV: &str = "CRMJOBS_GRAPHQL_URL";
pub const REMOTE_TIMEOUT_ENV: &str = "CRMJOBS_REMOTE_TIMEOUT_SECS";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const AUDIT_DIR_ENV: &str = "CRMJOBS_AUDIT_DIR";

pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:8000/graphql";
pub const DEFAULT_AUDIT_DIR: &str = "/tmp";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Run cadence per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub heartbeat: Duration,
    pub low_stock: Duration,
    pub reminders: Duration,
    pub report: Duration,
}

impl Intervals {
    pub fn for_task(&self, kind: TaskKind) -> Duration {
        match kind {
            TaskKind::Heartbeat => self.heartbeat,
            TaskKind::LowStock => self.low_stock,
            TaskKind::Reminders => self.reminders,
            TaskKind::Report => self.report,
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(default_interval_secs(TaskKind::Heartbeat)),
            low_stock: Duration::from_secs(default_interval_secs(TaskKind::LowStock)),
            reminders: Duration::from_secs(default_interval_secs(TaskKind::Reminders)),
            report: Duration::from_secs(default_interval_secs(TaskKind::Report)),
        }
    }
}

/// Environment variable holding the interval for `kind`.
pub fn interval_env(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Heartbeat => "CRMJOBS_HEARTBEAT_SECS",
        TaskKind::LowStock => "CRMJOBS_LOW_STOCK_SECS",
        TaskKind::Reminders => "CRMJOBS_REMINDER_SECS",
        TaskKind::Report => "CRMJOBS_REPORT_SECS",
    }
}

fn default_interval_secs(kind: TaskKind) -> u64 {
    match kind {
        // every 5 minutes
        TaskKind::Heartbeat => 300,
        // every 12 hours
        TaskKind::LowStock => 43_200,
        // daily
        TaskKind::Reminders => 86_400,
        // weekly
        TaskKind::Report => 604_800,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub graphql_url: String,
    pub remote_timeout: Duration,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub audit_dir: PathBuf,
    pub intervals: Intervals,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let graphql_url = match non_empty(&lookup, GRAPHQL_URL_ENV) {
            Some(url) => url,
            None => {
                warn!("{GRAPHQL_URL_ENV} not set; using {DEFAULT_GRAPHQL_URL}");
                DEFAULT_GRAPHQL_URL.to_string()
            }
        };

        let remote_timeout = Duration::from_secs(seconds(
            &lookup,
            REMOTE_TIMEOUT_ENV,
            DEFAULT_REMOTE_TIMEOUT_SECS,
        )?);

        let database_url = non_empty(&lookup, DATABASE_URL_ENV);
        if database_url.is_none() {
            warn!("{DATABASE_URL_ENV} not set; using in-memory CRM store");
        }

        let audit_dir = match lookup(AUDIT_DIR_ENV) {
            Some(dir) if dir.trim().is_empty() => return Err(ConfigError::Empty(AUDIT_DIR_ENV)),
            Some(dir) => PathBuf::from(dir.trim()),
            None => {
                warn!("{AUDIT_DIR_ENV} not set; writing audit logs to {DEFAULT_AUDIT_DIR}");
                PathBuf::from(DEFAULT_AUDIT_DIR)
            }
        };

        let interval = |kind: TaskKind| -> Result<Duration, ConfigError> {
            seconds(&lookup, interval_env(kind), default_interval_secs(kind)).map(Duration::from_secs)
        };
        let intervals = Intervals {
            heartbeat: interval(TaskKind::Heartbeat)?,
            low_stock: interval(TaskKind::LowStock)?,
            reminders: interval(TaskKind::Reminders)?,
            report: interval(TaskKind::Report)?,
        };

        Ok(Self {
            graphql_url,
            remote_timeout,
            database_url,
            audit_dir,
            intervals,
        })
    }
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidSeconds { var, value: raw }),
    }
}
