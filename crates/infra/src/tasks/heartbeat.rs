//! Liveness heartbeat: probe the remote and record the result.

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::remote::CrmRemote;

use super::{RunOutcome, Task, TaskKind, audited_run};

pub struct HeartbeatTask {
    remote: Arc<dyn CrmRemote>,
    audit: Arc<dyn AuditLog>,
}

impl HeartbeatTask {
    pub fn new(remote: Arc<dyn CrmRemote>, audit: Arc<dyn AuditLog>) -> Self {
        Self { remote, audit }
    }
}

impl Task for HeartbeatTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Heartbeat
    }

    /// Probe errors are embedded in the line; they do not fail the run.
    fn run(&self) -> RunOutcome {
        audited_run(self.audit.as_ref(), TaskKind::Heartbeat, |entry, outcome| {
            let status = match self.remote.probe() {
                Ok(_) => "GraphQL endpoint responsive".to_string(),
                Err(e) => format!("GraphQL endpoint error: {e}"),
            };
            entry.push(format!("CRM is alive - {status}"));
            outcome.detail = Some(status);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditChannel, InMemoryAuditLog};
    use crate::remote::RemoteError;
    use crate::testing::ScriptedRemote;

    #[test]
    fn responsive_remote_is_logged() {
        let audit = Arc::new(InMemoryAuditLog::new());
        let task = HeartbeatTask::new(Arc::new(ScriptedRemote::replenishing(vec![])), audit.clone());

        let outcome = task.run();

        assert!(outcome.success);
        let lines = audit.lines(AuditChannel::Heartbeat);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("CRM is alive - GraphQL endpoint responsive"));
    }

    #[test]
    fn probe_failure_is_text_not_failure() {
        let audit = Arc::new(InMemoryAuditLog::new());
        let task = HeartbeatTask::new(
            Arc::new(ScriptedRemote::failing(RemoteError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            })),
            audit.clone(),
        );

        let outcome = task.run();

        assert!(outcome.success);
        assert!(outcome.error.is_none());
        let lines = audit.lines(AuditChannel::Heartbeat);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("CRM is alive - GraphQL endpoint error: remote returned status 502"));
    }

    #[test]
    fn audit_failure_surfaces_in_outcome() {
        let audit = Arc::new(InMemoryAuditLog::new());
        audit.set_unavailable(true);
        let task = HeartbeatTask::new(Arc::new(ScriptedRemote::replenishing(vec![])), audit.clone());

        let outcome = task.run();

        assert!(!outcome.success);
        assert!(outcome.audit_error.is_some());
    }
}
