//! Order reminders for the trailing week.

use std::sync::Arc;

use tracing::info;

use crmjobs_sales::ReminderWindow;

use crate::audit::AuditLog;
use crate::remote::CrmRemote;

use super::{RunOutcome, Task, TaskKind, audited_run};

pub struct ReminderTask {
    remote: Arc<dyn CrmRemote>,
    audit: Arc<dyn AuditLog>,
    window: ReminderWindow,
}

impl ReminderTask {
    pub fn new(remote: Arc<dyn CrmRemote>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            remote,
            audit,
            window: ReminderWindow::default(),
        }
    }

    pub fn with_window(mut self, window: ReminderWindow) -> Self {
        self.window = window;
        self
    }
}

impl Task for ReminderTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Reminders
    }

    fn run(&self) -> RunOutcome {
        audited_run(self.audit.as_ref(), TaskKind::Reminders, |entry, outcome| {
            let since = self.window.since(outcome.started_at);
            // No fallback: a failed query means no reminders this run.
            let orders = self.remote.orders_since(since)?;

            entry.push("Order reminders batch started");
            for order in &orders {
                entry.push(order.to_string());
            }
            entry.push(format!("Processed {} order reminders", orders.len()));

            outcome.count = orders.len();
            info!(count = orders.len(), since = %since, "order reminders processed");
            Ok(())
        })
    }
}
