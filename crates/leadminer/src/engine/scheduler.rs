//! One cancellable polling task per running job.
//!
//! Each worker sleeps for the poll interval, then runs a tick, and repeats
//! until the job leaves Running or the worker is stopped. A worker removes
//! its own entry when it exits, unless a newer worker for the same job has
//! replaced it in the meantime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::worker::{run_tick, TickOutcome};
use super::EngineContext;

struct WorkerHandle {
    generation: u64,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub struct WorkerScheduler {
    workers: Mutex<HashMap<String, WorkerHandle>>,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for WorkerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerScheduler")
            .field("active", &self.active_job_ids())
            .finish()
    }
}

impl WorkerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<String, WorkerHandle>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Worker table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Spawns the worker for `job_id`. Returns `false` when one is already
    /// live or no tokio runtime is available.
    pub(crate) fn start(&self, ctx: &Arc<EngineContext>, job_id: &str) -> bool {
        let mut workers = self.workers();
        if workers
            .get(job_id)
            .is_some_and(|handle| !handle.task.is_finished())
        {
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(job_id, "No tokio runtime available, worker not started");
            return false;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = runtime.spawn(worker_loop(
            Arc::clone(ctx),
            job_id.to_string(),
            generation,
            stop_rx,
        ));
        workers.insert(
            job_id.to_string(),
            WorkerHandle {
                generation,
                stop: stop_tx,
                task,
            },
        );
        debug!(job_id, generation, "Worker started");
        true
    }

    /// Signals the worker to stop. A tick already waiting on the provider
    /// finishes, but its result is not committed.
    pub fn stop(&self, job_id: &str) -> bool {
        let handle = self.workers().remove(job_id);
        match handle {
            Some(handle) => {
                handle.stop.send_replace(true);
                debug!(job_id, "Worker stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) -> usize {
        let handles: Vec<(String, WorkerHandle)> = self.workers().drain().collect();
        for (_, handle) in &handles {
            handle.stop.send_replace(true);
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "Stopped all workers");
        }
        handles.len()
    }

    /// Ids of jobs with a live worker, sorted.
    pub fn active_job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .workers()
            .iter()
            .filter(|(_, handle)| !handle.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stop signal of the live worker, if any.
    pub(crate) fn stop_signal(&self, job_id: &str) -> Option<watch::Receiver<bool>> {
        self.workers().get(job_id).map(|handle| handle.stop.subscribe())
    }

    fn deregister(&self, job_id: &str, generation: u64) {
        let mut workers = self.workers();
        if workers
            .get(job_id)
            .is_some_and(|handle| handle.generation == generation)
        {
            workers.remove(job_id);
        }
    }
}

async fn worker_loop(
    ctx: Arc<EngineContext>,
    job_id: String,
    generation: u64,
    mut stop: watch::Receiver<bool>,
) {
    let interval = ctx.config.poll_interval();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }

        if *stop.borrow() {
            break;
        }
        if run_tick(&ctx, &job_id, &stop).await == TickOutcome::Stop {
            break;
        }
    }

    ctx.scheduler.deregister(&job_id, generation);
    ctx.tick_locks.release(&job_id);
    debug!(job_id = %job_id, generation, "Worker exited");
}
