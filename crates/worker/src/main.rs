use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crmjobs_infra::audit::{AuditLog, FileAuditLog};
use crmjobs_infra::config::WorkerConfig;
use crmjobs_infra::remote::{CrmRemote, GraphQlCrmClient};
use crmjobs_infra::runner::{TaskRunner, TaskSchedule, run_once};
use crmjobs_infra::store::{CrmStatsStore, InMemoryCrmStore, InventoryStore, PostgresCrmStore};
use crmjobs_infra::tasks::{HeartbeatTask, ReconciliationTask, ReminderTask, ReportTask, Task, TaskKind};

#[derive(Parser, Debug)]
#[command(name = "crmjobs-worker", version, about = "Scheduled CRM maintenance jobs")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every task on its schedule until interrupted (default).
    Serve,

    /// Run a single task once and print its outcome as JSON.
    Run {
        /// heartbeat, low-stock, reminders or report
        task: TaskKind,
    },
}

/// Shared adapters every task is built from.
struct Adapters {
    remote: Arc<dyn CrmRemote>,
    inventory: Arc<dyn InventoryStore>,
    stats: Arc<dyn CrmStatsStore>,
    audit: Arc<dyn AuditLog>,
}

impl Adapters {
    fn build(cfg: &WorkerConfig) -> anyhow::Result<Self> {
        let remote = GraphQlCrmClient::new(cfg.graphql_url.clone(), cfg.remote_timeout)
            .context("failed to build GraphQL client")?;

        let (inventory, stats) = match &cfg.database_url {
            Some(url) => {
                let store = Arc::new(
                    PostgresCrmStore::connect(url, cfg.remote_timeout)
                        .context("failed to connect to CRM database")?,
                );
                (store.clone() as Arc<dyn InventoryStore>, store as Arc<dyn CrmStatsStore>)
            }
            None => {
                let store = Arc::new(InMemoryCrmStore::new());
                (store.clone() as Arc<dyn InventoryStore>, store as Arc<dyn CrmStatsStore>)
            }
        };

        tracing::info!(
            endpoint = %cfg.graphql_url,
            audit_dir = %cfg.audit_dir.display(),
            persistent = cfg.database_url.is_some(),
            "adapters ready"
        );

        Ok(Self {
            remote: Arc::new(remote),
            inventory,
            stats,
            audit: Arc::new(FileAuditLog::new(cfg.audit_dir.clone())),
        })
    }

    fn task(&self, kind: TaskKind) -> Arc<dyn Task> {
        match kind {
            TaskKind::Heartbeat => Arc::new(HeartbeatTask::new(self.remote.clone(), self.audit.clone())),
            TaskKind::LowStock => Arc::new(ReconciliationTask::new(
                self.remote.clone(),
                self.inventory.clone(),
                self.audit.clone(),
            )),
            TaskKind::Reminders => Arc::new(ReminderTask::new(self.remote.clone(), self.audit.clone())),
            TaskKind::Report => Arc::new(ReportTask::new(self.stats.clone(), self.audit.clone())),
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    crmjobs_observability::init();

    let cli = Cli::parse();
    let cfg = WorkerConfig::from_env().context("invalid worker configuration")?;
    let adapters = Adapters::build(&cfg)?;

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(&cfg, &adapters)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { task } => {
            let outcome = run_once(adapters.task(task).as_ref());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn serve(cfg: &WorkerConfig, adapters: &Adapters) -> anyhow::Result<()> {
    let mut handles = Vec::with_capacity(TaskKind::ALL.len());
    for kind in TaskKind::ALL {
        let schedule = TaskSchedule::every(cfg.intervals.for_task(kind));
        let handle = TaskRunner::new(schedule)
            .spawn(adapters.task(kind))
            .with_context(|| format!("failed to spawn {kind} runner"))?;
        handles.push(handle);
    }

    tracing::info!(runners = handles.len(), "crmjobs worker running; press Ctrl-C to stop");

    // The tasks themselves are blocking; tokio only waits for the signal.
    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    signals
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutdown requested; waiting for in-flight runs");
    for handle in handles {
        handle.shutdown();
    }
    tracing::info!("crmjobs worker stopped");
    Ok(())
}
