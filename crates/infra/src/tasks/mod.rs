//! Scheduled CRM tasks.
//!
//! Every task exposes a zero-argument `run()` that returns a [`RunOutcome`] and
//! never propagates a failure. The shared [`audited_run`] scaffolding owns the
//! audit discipline: exactly one entry group is appended per invocation, after
//! all work has finished or failed, including when the task body panics.

pub mod heartbeat;
pub mod reconcile;
pub mod reminders;
pub mod report;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crmjobs_core::RunId;
use crmjobs_inventory::{ReplenishmentDelta, ReplenishmentPath};

use crate::audit::{AuditChannel, AuditEntry, AuditError, AuditLog};
use crate::remote::RemoteError;
use crate::store::StoreError;

pub use heartbeat::HeartbeatTask;
pub use reconcile::ReconciliationTask;
pub use reminders::ReminderTask;
pub use report::ReportTask;

/// The four scheduled task types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Heartbeat,
    LowStock,
    Reminders,
    Report,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Heartbeat,
        TaskKind::LowStock,
        TaskKind::Reminders,
        TaskKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Heartbeat => "heartbeat",
            TaskKind::LowStock => "low-stock",
            TaskKind::Reminders => "reminders",
            TaskKind::Report => "report",
        }
    }

    pub fn channel(&self) -> AuditChannel {
        match self {
            TaskKind::Heartbeat => AuditChannel::Heartbeat,
            TaskKind::LowStock => AuditChannel::LowStock,
            TaskKind::Reminders => AuditChannel::Reminders,
            TaskKind::Report => AuditChannel::Report,
        }
    }

    /// Prefix of the audit line written when a run fails.
    fn failure_label(&self) -> &'static str {
        match self {
            TaskKind::Heartbeat => "Heartbeat failed",
            TaskKind::LowStock => "Error in both remote API and fallback",
            TaskKind::Reminders => "Error processing order reminders",
            TaskKind::Report => "ERROR: Error generating CRM report",
        }
    }
}

impl core::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown task: {0} (expected heartbeat, low-stock, reminders or report)")]
pub struct UnknownTask(String);

impl core::str::FromStr for TaskKind {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

/// Classified failure of a task run.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "message", rename_all = "snake_case")]
pub enum TaskError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("audit error: {0}")]
    Audit(String),

    #[error("run aborted: {0}")]
    Aborted(String),
}

impl From<RemoteError> for TaskError {
    fn from(e: RemoteError) -> Self {
        TaskError::Transport(e.to_string())
    }
}

impl From<StoreError> for TaskError {
    fn from(e: StoreError) -> Self {
        TaskError::Store(e.to_string())
    }
}

impl From<AuditError> for TaskError {
    fn from(e: AuditError) -> Self {
        TaskError::Audit(e.to_string())
    }
}

/// Summary of one task invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub task: TaskKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    /// Inventory path that executed (reconciliation only).
    pub path: Option<ReplenishmentPath>,
    /// Items adjusted, or orders processed for reminders.
    pub count: usize,
    pub deltas: Vec<ReplenishmentDelta>,
    /// Task-specific result text (probe result, report figures).
    pub detail: Option<String>,
    /// Why the primary path was abandoned, when the fallback ran.
    pub remote_error: Option<String>,
    pub error: Option<TaskError>,
    pub audit_error: Option<TaskError>,
}

impl RunOutcome {
    fn started(task: TaskKind) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            task,
            started_at: now,
            finished_at: now,
            success: true,
            path: None,
            count: 0,
            deltas: Vec::new(),
            detail: None,
            remote_error: None,
            error: None,
            audit_error: None,
        }
    }

    fn fail(&mut self, error: TaskError) {
        self.success = false;
        self.error = Some(error);
    }
}

/// A zero-argument scheduled entry point.
pub trait Task: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Run once. Never panics past this boundary and never returns an error;
    /// failures are reported inside the outcome.
    fn run(&self) -> RunOutcome;
}

/// Run `body` and append its audit entry exactly once.
///
/// The body fills in the entry and the outcome. Whatever the body does
/// (returns `Ok`, returns `Err`, or panics) the entry is completed with a
/// failure line when needed and appended before this function returns. An
/// audit write failure is reported through `tracing` and recorded in the
/// outcome; it is never retried.
pub(crate) fn audited_run<F>(audit: &dyn AuditLog, task: TaskKind, body: F) -> RunOutcome
where
    F: FnOnce(&mut AuditEntry, &mut RunOutcome) -> Result<(), TaskError>,
{
    let mut outcome = RunOutcome::started(task);
    let mut entry = AuditEntry::new(task.channel(), outcome.started_at);

    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut entry, &mut outcome)));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => outcome.fail(e),
        Err(payload) => outcome.fail(TaskError::Aborted(panic_message(payload.as_ref()))),
    }

    if let Some(e) = &outcome.error {
        warn!(task = %task, run_id = %outcome.run_id, error = %e, "task run failed");
        entry.push(format!("{}: {}", task.failure_label(), e));
    }
    if entry.is_empty() {
        entry.push(format!("{task} run finished"));
    }

    outcome.finished_at = Utc::now();

    match audit.append(entry.channel(), entry.lines()) {
        Ok(()) => {
            info!(
                task = %task,
                run_id = %outcome.run_id,
                success = outcome.success,
                count = outcome.count,
                "task run recorded"
            );
        }
        Err(e) => {
            error!(
                task = %task,
                run_id = %outcome.run_id,
                channel = %entry.channel(),
                error = %e,
                lines = ?entry.lines(),
                "failed to append audit entry"
            );
            outcome.success = false;
            outcome.audit_error = Some(e.into());
        }
    }

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;

    #[test]
    fn task_kind_parses_cli_names() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), kind);
        }
        assert!("weekly".parse::<TaskKind>().is_err());
    }

    #[test]
    fn successful_body_appends_one_group() {
        let audit = InMemoryAuditLog::new();
        let outcome = audited_run(&audit, TaskKind::Report, |entry, _| {
            entry.push("Report: 0 customers, 0 orders, 0.00 revenue");
            Ok(())
        });

        assert!(outcome.success);
        assert_eq!(audit.entries(AuditChannel::Report).len(), 1);
    }

    #[test]
    fn failing_body_gets_an_error_line() {
        let audit = InMemoryAuditLog::new();
        let outcome = audited_run(&audit, TaskKind::Reminders, |_, _| {
            Err(TaskError::Transport("connection refused".to_string()))
        });

        assert!(!outcome.success);
        let lines = audit.lines(AuditChannel::Reminders);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Error processing order reminders: transport error: connection refused"));
    }

    #[test]
    fn panicking_body_is_still_audited() {
        let audit = InMemoryAuditLog::new();
        let outcome = audited_run(&audit, TaskKind::LowStock, |entry, _| {
            entry.push("Low stock update batch started");
            panic!("boom");
        });

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(TaskError::Aborted("boom".to_string())));
        let groups = audit.entries(AuditChannel::LowStock);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn audit_failure_is_reported_to_caller() {
        let audit = InMemoryAuditLog::new();
        audit.set_unavailable(true);
        let outcome = audited_run(&audit, TaskKind::Heartbeat, |entry, _| {
            entry.push("CRM is alive");
            Ok(())
        });

        assert!(!outcome.success);
        assert!(outcome.error.is_none());
        assert!(matches!(outcome.audit_error, Some(TaskError::Audit(_))));
    }

    #[test]
    fn error_serializes_with_category() {
        let json = serde_json::to_value(TaskError::Store("offline".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"category": "store", "message": "offline"}));
    }
}
