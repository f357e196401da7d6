//! Append-only audit channels.
//!
//! Every task invocation appends exactly one entry group to its channel. The
//! sink is injected as a trait object so tests can substitute the in-memory
//! implementation for the file-backed one.

pub mod file;
pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileAuditLog;
pub use memory::InMemoryAuditLog;

/// One named append-only stream per task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditChannel {
    Heartbeat,
    LowStock,
    Reminders,
    Report,
}

impl AuditChannel {
    pub const ALL: [AuditChannel; 4] = [
        AuditChannel::Heartbeat,
        AuditChannel::LowStock,
        AuditChannel::Reminders,
        AuditChannel::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditChannel::Heartbeat => "heartbeat",
            AuditChannel::LowStock => "low-stock",
            AuditChannel::Reminders => "reminders",
            AuditChannel::Report => "report",
        }
    }

    /// File name used by [`FileAuditLog`] for this channel.
    pub fn file_name(&self) -> &'static str {
        match self {
            AuditChannel::Heartbeat => "crm_heartbeat_log.txt",
            AuditChannel::LowStock => "low_stock_updates_log.txt",
            AuditChannel::Reminders => "order_reminders_log.txt",
            AuditChannel::Report => "crm_report_log.txt",
        }
    }

    /// Render one timestamped line in this channel's layout.
    pub fn stamp(&self, at: DateTime<Utc>, message: &str) -> String {
        match self {
            AuditChannel::Heartbeat => format!("{} {message}", at.format("%d/%m/%Y-%H:%M:%S")),
            AuditChannel::LowStock | AuditChannel::Reminders => {
                format!("[{}] {message}", at.format("%Y-%m-%d %H:%M:%S"))
            }
            AuditChannel::Report => format!("{} - {message}", at.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl core::fmt::Display for AuditChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to append to audit channel {channel}: {source}")]
    Io {
        channel: AuditChannel,
        #[source]
        source: std::io::Error,
    },

    #[error("audit channel {0} is unavailable")]
    Unavailable(AuditChannel),

    #[error("audit entry for channel {0} is empty")]
    EmptyEntry(AuditChannel),
}

/// Append-only sink for audit lines.
///
/// `append` must not return `Ok` before the lines are durable, and must be
/// callable from error-recovery paths (it never panics on its own).
pub trait AuditLog: Send + Sync {
    /// Append one entry group. The lines are written contiguously and in order.
    fn append(&self, channel: AuditChannel, lines: &[String]) -> Result<(), AuditError>;
}

impl<A> AuditLog for Arc<A>
where
    A: AuditLog + ?Sized,
{
    fn append(&self, channel: AuditChannel, lines: &[String]) -> Result<(), AuditError> {
        (**self).append(channel, lines)
    }
}

/// Lines collected during one run, stamped with the run's start time.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    channel: AuditChannel,
    at: DateTime<Utc>,
    lines: Vec<String>,
}

impl AuditEntry {
    pub fn new(channel: AuditChannel, at: DateTime<Utc>) -> Self {
        Self {
            channel,
            at,
            lines: Vec::new(),
        }
    }

    pub fn channel(&self) -> AuditChannel {
        self.channel
    }

    pub fn push(&mut self, message: impl AsRef<str>) {
        let line = self.channel.stamp(self.at, message.as_ref());
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
