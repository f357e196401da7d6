//! Dual-path low-stock reconciliation.
//!
//! Primary path: one bulk replenishment call to the remote API. Fallback:
//! re-read the low-stock items from the store and increment each one
//! individually. The paths are mutually exclusive within a run.
//!
//! Known gap: when the remote applies the mutation but its response fails
//! validation, the fallback re-reads fresh stock and may replenish the same
//! items a second time. The audit entry keeps the remote failure reason so
//! such runs can be spotted.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crmjobs_core::{Entity, ItemId};
use crmjobs_inventory::{ReplenishmentDelta, ReplenishmentPath, ReplenishmentPolicy};

use crate::audit::{AuditEntry, AuditLog};
use crate::remote::{BulkReplenishment, CrmRemote};
use crate::store::InventoryStore;

use super::{RunOutcome, Task, TaskError, TaskKind, audited_run};

pub struct ReconciliationTask {
    remote: Arc<dyn CrmRemote>,
    store: Arc<dyn InventoryStore>,
    audit: Arc<dyn AuditLog>,
    policy: ReplenishmentPolicy,
}

impl ReconciliationTask {
    pub fn new(
        remote: Arc<dyn CrmRemote>,
        store: Arc<dyn InventoryStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            remote,
            store,
            audit,
            policy: ReplenishmentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReplenishmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn reconcile(&self, entry: &mut AuditEntry, outcome: &mut RunOutcome) -> Result<(), TaskError> {
        entry.push("Low stock update batch started");

        // Step 1: snapshot of the target set. Only used for bookkeeping and the
        // empty-set short-circuit; the fallback always re-reads.
        let snapshot = match self.store.list_below(self.policy.threshold()) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(error = %e, "low-stock snapshot unavailable; trying remote anyway");
                entry.push(format!("Local snapshot unavailable: {e}"));
                None
            }
        };

        if let Some(items) = &snapshot {
            if items.is_empty() {
                entry.push(format!(
                    "No items below threshold {}; updated 0 products",
                    self.policy.threshold()
                ));
                return Ok(());
            }
        }

        let previous: HashMap<ItemId, u32> = snapshot
            .iter()
            .flatten()
            .map(|item| (item.id().clone(), item.stock()))
            .collect();

        match self.remote.bulk_replenish_low_stock() {
            Ok(result) => {
                self.record_remote(entry, outcome, result, &previous);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "remote replenishment failed; falling back to direct store update");
                outcome.remote_error = Some(e.to_string());
                entry.push("Remote API failed, using direct store update");
                entry.push(format!("Remote API error: {e}"));
                self.fallback(entry, outcome)
            }
        }
    }

    fn record_remote(
        &self,
        entry: &mut AuditEntry,
        outcome: &mut RunOutcome,
        result: BulkReplenishment,
        previous: &HashMap<ItemId, u32>,
    ) {
        outcome.path = Some(ReplenishmentPath::Remote);
        if !result.message.trim().is_empty() {
            entry.push(&result.message);
        }

        for item in result.items {
            let delta = ReplenishmentDelta {
                previous_stock: previous.get(&item.item_id).copied(),
                item_id: item.item_id,
                name: item.name,
                new_stock: item.stock,
                path: ReplenishmentPath::Remote,
            };
            entry.push(delta.to_string());
            outcome.deltas.push(delta);
        }

        outcome.count = result.count;
        entry.push(format!("Updated {} products via remote API", result.count));
        info!(count = result.count, path = %ReplenishmentPath::Remote, "low-stock items replenished");
    }

    fn fallback(&self, entry: &mut AuditEntry, outcome: &mut RunOutcome) -> Result<(), TaskError> {
        outcome.path = Some(ReplenishmentPath::LocalFallback);

        let current = self.store.list_below(self.policy.threshold())?;

        for item in self.policy.targets(&current) {
            let delta = self
                .policy
                .replenish(item)
                .map_err(|e| TaskError::Store(format!("cannot replenish {}: {e}", item.id())))?;

            // Already-written items stay written if a later write fails.
            self.store.set_stock(&delta.item_id, delta.new_stock)?;

            entry.push(delta.to_string());
            outcome.deltas.push(delta);
            outcome.count += 1;
        }

        entry.push(format!("Updated {} products via fallback", outcome.count));
        info!(
            count = outcome.count,
            path = %ReplenishmentPath::LocalFallback,
            "low-stock items replenished"
        );
        Ok(())
    }
}

impl Task for ReconciliationTask {
    fn kind(&self) -> TaskKind {
        TaskKind::LowStock
    }

    fn run(&self) -> RunOutcome {
        audited_run(self.audit.as_ref(), TaskKind::LowStock, |entry, outcome| {
            self.reconcile(entry, outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditChannel, InMemoryAuditLog};
    use crate::remote::RemoteError;
    use crate::store::InMemoryCrmStore;
    use crate::testing::{ScriptedRemote, item, replenished};

    fn setup(
        items: Vec<crmjobs_inventory::InventoryItem>,
        remote: ScriptedRemote,
    ) -> (ReconciliationTask, Arc<InMemoryCrmStore>, Arc<InMemoryAuditLog>, Arc<ScriptedRemote>) {
        let store = Arc::new(InMemoryCrmStore::with_items(items));
        let audit = Arc::new(InMemoryAuditLog::new());
        let remote = Arc::new(remote);
        let task = ReconciliationTask::new(remote.clone(), store.clone(), audit.clone());
        (task, store, audit, remote)
    }

    #[test]
    fn empty_target_set_skips_both_paths() {
        let (task, store, audit, remote) =
            setup(vec![item("Y", 12)], ScriptedRemote::failing(RemoteError::Timeout));

        let outcome = task.run();

        assert!(outcome.success);
        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.path, None);
        assert_eq!(remote.bulk_calls(), 0);
        assert_eq!(store.write_count(), 0);
        assert_eq!(audit.entries(AuditChannel::LowStock).len(), 1);
    }

    #[test]
    fn remote_items_carry_previous_stock_from_snapshot() {
        let (task, _store, _audit, _remote) = setup(
            vec![item("Z", 3)],
            ScriptedRemote::replenishing(vec![replenished("Z", 13), replenished("W", 11)]),
        );

        let outcome = task.run();

        assert_eq!(outcome.deltas[0].previous_stock, Some(3));
        assert_eq!(outcome.deltas[1].previous_stock, None);
        assert!(outcome.deltas.iter().all(|d| d.path == ReplenishmentPath::Remote));
    }

    #[test]
    fn fallback_rereads_current_stock() {
        let (task, store, _audit, remote) = setup(
            vec![item("X", 5)],
            ScriptedRemote::failing(RemoteError::malformed("count missing")),
        );
        // Stock changes between the snapshot and the fallback read.
        let store_for_remote = store.clone();
        remote.on_bulk_call(move || {
            store_for_remote
                .set_stock(&ItemId::new("X").unwrap(), 7)
                .unwrap();
        });

        let outcome = task.run();

        assert!(outcome.success);
        assert_eq!(outcome.deltas[0].previous_stock, Some(7));
        assert_eq!(store.stock_of("X"), Some(17));
    }

    #[test]
    fn fallback_skips_items_fixed_by_partial_remote() {
        let (task, store, _audit, remote) = setup(
            vec![item("A", 2), item("B", 4)],
            ScriptedRemote::failing(RemoteError::malformed("truncated body")),
        );
        let store_for_remote = store.clone();
        remote.on_bulk_call(move || {
            store_for_remote
                .set_stock(&ItemId::new("A").unwrap(), 12)
                .unwrap();
        });

        let outcome = task.run();

        assert_eq!(outcome.count, 1);
        assert_eq!(store.stock_of("A"), Some(12));
        assert_eq!(store.stock_of("B"), Some(14));
    }

    #[test]
    fn partial_fallback_keeps_written_items_and_fails() {
        let (task, store, audit, _remote) = setup(
            vec![item("A", 1), item("B", 2)],
            ScriptedRemote::failing(RemoteError::Transport("refused".to_string())),
        );
        store.fail_writes_after(1);

        let outcome = task.run();

        assert!(!outcome.success);
        assert_eq!(store.stock_of("A"), Some(11));
        assert_eq!(store.stock_of("B"), Some(2));
        assert_eq!(outcome.deltas.len(), 1);
        let lines = audit.lines(AuditChannel::LowStock);
        assert!(lines.iter().any(|l| l.contains("stock 1 -> 11")));
        assert!(lines.iter().any(|l| l.contains("Error in both remote API and fallback")));
    }

    #[test]
    fn unreadable_snapshot_still_tries_remote() {
        let (task, store, _audit, remote) = setup(
            vec![item("Z", 3)],
            ScriptedRemote::replenishing(vec![replenished("Z", 13)]),
        );
        store.set_fail_reads(true);

        let outcome = task.run();

        assert!(outcome.success);
        assert_eq!(remote.bulk_calls(), 1);
        assert_eq!(outcome.path, Some(ReplenishmentPath::Remote));
        assert_eq!(outcome.deltas[0].previous_stock, None);
    }

    #[test]
    fn fallback_read_failure_fails_the_run() {
        let (task, store, audit, _remote) =
            setup(vec![item("Z", 3)], ScriptedRemote::failing(RemoteError::Timeout));
        store.set_fail_reads(true);

        let outcome = task.run();

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(TaskError::Store(_))));
        assert_eq!(audit.entries(AuditChannel::LowStock).len(), 1);
    }
}
