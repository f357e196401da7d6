//! Periodic CRM summary report, computed from the store only.

use std::sync::Arc;

use tracing::info;

use crate::audit::AuditLog;
use crate::store::CrmStatsStore;

use super::{RunOutcome, Task, TaskKind, audited_run};

pub struct ReportTask {
    store: Arc<dyn CrmStatsStore>,
    audit: Arc<dyn AuditLog>,
}

impl ReportTask {
    pub fn new(store: Arc<dyn CrmStatsStore>, audit: Arc<dyn AuditLog>) -> Self {
        Self { store, audit }
    }
}

impl Task for ReportTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Report
    }

    fn run(&self) -> RunOutcome {
        audited_run(self.audit.as_ref(), TaskKind::Report, |entry, outcome| {
            let summary = self.store.summary()?;
            entry.push(format!("Report: {summary}"));
            info!(
                customers = summary.customers,
                orders = summary.orders,
                revenue = %summary.revenue,
                "CRM report generated"
            );
            outcome.detail = Some(summary.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmjobs_core::Money;
    use crmjobs_sales::Customer;

    use crate::audit::{AuditChannel, InMemoryAuditLog};
    use crate::store::InMemoryCrmStore;
    use crate::tasks::TaskError;

    #[test]
    fn writes_one_summary_line() {
        let store = Arc::new(InMemoryCrmStore::new());
        store.add_customer(Customer {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        });
        store.add_order(Money::from_minor(12345));
        let audit = Arc::new(InMemoryAuditLog::new());

        let outcome = ReportTask::new(store, audit.clone()).run();

        assert!(outcome.success);
        assert_eq!(outcome.detail.as_deref(), Some("1 customers, 1 orders, 123.45 revenue"));
        let lines = audit.lines(AuditChannel::Report);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - Report: 1 customers, 1 orders, 123.45 revenue"));
    }

    #[test]
    fn store_failure_writes_error_line() {
        let store = Arc::new(InMemoryCrmStore::new());
        store.set_fail_reads(true);
        let audit = Arc::new(InMemoryAuditLog::new());

        let outcome = ReportTask::new(store, audit.clone()).run();

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(TaskError::Store(_))));
        let lines = audit.lines(AuditChannel::Report);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" - ERROR: Error generating CRM report: store error: store unavailable"));
    }

    #[test]
    fn failed_error_write_is_only_reported_to_caller() {
        let store = Arc::new(InMemoryCrmStore::new());
        store.set_fail_reads(true);
        let audit = Arc::new(InMemoryAuditLog::new());
        audit.set_unavailable(true);

        let outcome = ReportTask::new(store, audit.clone()).run();

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(TaskError::Store(_))));
        assert!(matches!(outcome.audit_error, Some(TaskError::Audit(_))));
        assert!(audit.lines(AuditChannel::Report).is_empty());
    }
}
