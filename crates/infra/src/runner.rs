use std::io;
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::tasks::{RunOutcome, Task};

/// Cadence of one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSchedule {
    pub interval: Duration,
    pub run_on_start: bool,
}

impl TaskSchedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            run_on_start: true,
        }
    }

    pub fn without_startup_run(mut self) -> Self {
        self.run_on_start = false;
        self
    }
}

/// Handle for a running task thread (shutdown + trigger hook).
#[derive(Debug)]
pub struct TaskRunnerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    last: Arc<Mutex<Option<RunOutcome>>>,
    join: Option<thread::JoinHandle<()>>,
}

impl TaskRunnerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request an extra run as soon as the current one (if any) finishes.
    ///
    /// Triggers are coalesced: with one already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Most recent outcome, if the task has run at least once.
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop the thread. A run in progress is allowed to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(runner = %self.name, "task runner thread panicked");
            }
        }
    }
}

/// Spawns a dedicated thread that runs one task on a fixed cadence.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    schedule: TaskSchedule,
}

impl TaskRunner {
    pub fn new(schedule: TaskSchedule) -> Self {
        Self { schedule }
    }

    pub fn spawn(&self, task: Arc<dyn Task>) -> io::Result<TaskRunnerHandle> {
        let name = format!("crmjobs-{}", task.kind());
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);
        let last = Arc::new(Mutex::new(None));

        let schedule = self.schedule;
        let thread_name = name.clone();
        let thread_last = Arc::clone(&last);
        let join = thread::Builder::new().name(name.clone()).spawn(move || {
            runner_loop(&thread_name, schedule, task, shutdown_rx, trigger_rx, thread_last)
        })?;

        Ok(TaskRunnerHandle {
            name,
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            last,
            join: Some(join),
        })
    }
}

/// Run a task a single time on the calling thread.
pub fn run_once(task: &dyn Task) -> RunOutcome {
    let outcome = task.run();
    log_outcome(&outcome);
    outcome
}

fn runner_loop(
    name: &str,
    schedule: TaskSchedule,
    task: Arc<dyn Task>,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    last: Arc<Mutex<Option<RunOutcome>>>,
) {
    info!(runner = name, interval_secs = schedule.interval.as_secs(), "task runner started");

    let mut next_tick = Instant::now() + schedule.interval;
    let mut pending = schedule.run_on_start;

    loop {
        // Shutdown has priority.
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Missed ticks collapse into one run.
            while next_tick <= now {
                next_tick += schedule.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let wait = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            match shutdown_rx.recv_timeout(wait) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
            }
        }

        pending = false;
        let outcome = run_once(task.as_ref());
        *last.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }

    info!(runner = name, "task runner stopped");
}

fn log_outcome(outcome: &RunOutcome) {
    if outcome.success {
        info!(
            task = %outcome.task,
            run_id = %outcome.run_id,
            count = outcome.count,
            path = ?outcome.path,
            "task run succeeded"
        );
    } else {
        warn!(
            task = %outcome.task,
            run_id = %outcome.run_id,
            error = ?outcome.error,
            audit_error = ?outcome.audit_error,
            "task run failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::audit::InMemoryAuditLog;
    use crate::tasks::{TaskKind, audited_run};

    struct CountingTask {
        runs: AtomicUsize,
        audit: InMemoryAuditLog,
    }

    impl CountingTask {
        fn new() -> Self {
            Self {
                runs: AtomicUsize::new(0),
                audit: InMemoryAuditLog::new(),
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl Task for CountingTask {
        fn kind(&self) -> TaskKind {
            TaskKind::Heartbeat
        }

        fn run(&self) -> RunOutcome {
            audited_run(&self.audit, TaskKind::Heartbeat, |entry, outcome| {
                let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
                entry.push(format!("run {n}"));
                outcome.count = n;
                Ok(())
            })
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn runs_on_start_and_records_outcome() {
        let task = Arc::new(CountingTask::new());
        let handle = TaskRunner::new(TaskSchedule::every(Duration::from_secs(3600)))
            .spawn(task.clone())
            .unwrap();

        assert!(wait_for(|| handle.last_outcome().is_some()));
        let outcome = handle.last_outcome().unwrap();
        assert_eq!(outcome.count, 1);
        assert!(outcome.success);

        handle.shutdown();
        assert_eq!(task.runs(), 1);
    }

    #[test]
    fn trigger_runs_without_waiting_for_the_tick() {
        let task = Arc::new(CountingTask::new());
        let handle = TaskRunner::new(TaskSchedule::every(Duration::from_secs(3600)).without_startup_run())
            .spawn(task.clone())
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(task.runs(), 0);

        handle.trigger();
        assert!(wait_for(|| task.runs() == 1));

        handle.shutdown();
    }

    #[test]
    fn short_interval_repeats() {
        let task = Arc::new(CountingTask::new());
        let handle = TaskRunner::new(TaskSchedule::every(Duration::from_millis(20)))
            .spawn(task.clone())
            .unwrap();

        assert!(wait_for(|| task.runs() >= 3));
        handle.shutdown();
    }

    #[test]
    fn shutdown_stops_further_runs() {
        let task = Arc::new(CountingTask::new());
        let handle = TaskRunner::new(TaskSchedule::every(Duration::from_millis(10)))
            .spawn(task.clone())
            .unwrap();

        assert!(wait_for(|| task.runs() >= 1));
        handle.shutdown();
        let after = task.runs();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(task.runs(), after);
    }

    #[test]
    fn run_once_returns_the_outcome() {
        let task = CountingTask::new();
        let outcome = run_once(&task);
        assert_eq!(outcome.task, TaskKind::Heartbeat);
        assert_eq!(task.runs(), 1);
    }
}
