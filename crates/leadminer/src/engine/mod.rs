//! The lead-mining job engine.
//!
//! [`MiningEngine`] owns the job registry, one polling worker per running
//! job, the dedup pipeline, the audit log and the change notifier. Every
//! collaborator is injected at construction.

pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod worker;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::audit::{AuditLog, SnapshotManager};
use crate::broadcast::{ChangeBroadcaster, MiningEvent, MiningEventKind};
use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::model::{normalize_cnpj, JobStatus, MiningJob, MiningLead, NewJob};
use crate::provider::DiscoveryProvider;
use crate::store::Store;

pub use pipeline::LeadPipeline;
pub use registry::JobRegistry;
pub use scheduler::WorkerScheduler;
pub use state::{apply_control, ControlAction};
pub use worker::TickOutcome;

/// State shared between the engine and its workers.
pub(crate) struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) store: Store,
    pub(crate) registry: JobRegistry,
    pub(crate) pipeline: LeadPipeline,
    pub(crate) provider: Arc<dyn DiscoveryProvider>,
    pub(crate) audit: AuditLog,
    pub(crate) snapshots: SnapshotManager,
    pub(crate) events: ChangeBroadcaster,
    pub(crate) scheduler: WorkerScheduler,
    pub(crate) tick_locks: worker::TickLocks,
    /// Held while a job's status and its worker are changed together.
    pub(crate) control: Mutex<()>,
}

pub struct MiningEngine {
    ctx: Arc<EngineContext>,
}

impl std::fmt::Debug for MiningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningEngine")
            .field("environment", &self.ctx.store.environment().get())
            .field("scheduler", &self.ctx.scheduler)
            .finish_non_exhaustive()
    }
}

impl MiningEngine {
    /// Builds an engine over `store`. No worker runs until a job is created,
    /// resumed or [`hydrate`](Self::hydrate)d.
    pub fn new(config: EngineConfig, store: Store, provider: Arc<dyn DiscoveryProvider>) -> Self {
        let events = ChangeBroadcaster::new(config.event_capacity);
        let audit = AuditLog::new(store.clone(), config.audit_log_cap);
        let snapshots = SnapshotManager::new(
            store.clone(),
            audit.clone(),
            events.clone(),
            config.snapshot_retention,
        );

        let ctx = EngineContext {
            registry: JobRegistry::new(store.clone()),
            pipeline: LeadPipeline::new(store.clone()),
            scheduler: WorkerScheduler::new(),
            tick_locks: worker::TickLocks::default(),
            control: Mutex::new(()),
            config,
            store,
            provider,
            audit,
            snapshots,
            events,
        };
        Self { ctx: Arc::new(ctx) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.ctx.audit
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.ctx.snapshots
    }

    pub fn pipeline(&self) -> &LeadPipeline {
        &self.ctx.pipeline
    }

    pub fn environment(&self) -> Environment {
        self.ctx.store.environment().get()
    }

    fn control_guard(&self) -> MutexGuard<'_, ()> {
        match self.ctx.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts or stops the job's worker to match its persisted status.
    /// Callers hold the control guard.
    fn sync_worker(&self, job_id: &str) {
        match self.ctx.registry.get(job_id).map(|job| job.status) {
            Some(JobStatus::Running) => {
                self.ctx.scheduler.start(&self.ctx, job_id);
            }
            _ => {
                self.ctx.scheduler.stop(job_id);
                self.ctx.tick_locks.release(job_id);
            }
        }
    }

    /// Validates and persists a new Running job, then starts its worker.
    pub fn create_job(&self, request: NewJob) -> Result<MiningJob> {
        let job = MiningJob::from_request(request)?;
        self.ctx.registry.insert(&job)?;

        info!(
            job_id = %job.id,
            name = %job.name,
            target = job.target_count,
            "Mining job created"
        );
        self.ctx
            .audit
            .log_change::<MiningJob>("job.create", &job.id, &self.ctx.config.actor, None, Some(&job));
        self.ctx.events.send(MiningEventKind::JobUpdated {
            job_id: job.id.clone(),
            status: job.status,
        });

        self.ctx.scheduler.start(&self.ctx, &job.id);
        Ok(job)
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Vec<MiningJob> {
        self.ctx.registry.list()
    }

    pub fn get_job(&self, job_id: &str) -> Option<MiningJob> {
        self.ctx.registry.get(job_id)
    }

    /// Leads of one job that have not been promoted yet.
    pub fn get_leads_for_job(&self, job_id: &str) -> Vec<MiningLead> {
        self.ctx.registry.leads_for_job(job_id)
    }

    pub fn list_unimported_leads(&self) -> Vec<MiningLead> {
        self.ctx.registry.unimported_leads()
    }

    /// Applies a control action. Returns `None` for an unknown job and the
    /// unchanged job when the action does not apply to its status.
    pub fn control_job(&self, job_id: &str, action: ControlAction) -> Result<Option<MiningJob>> {
        let control = self.control_guard();
        let outcome = self.ctx.registry.update(job_id, |job| {
            let before = job.clone();
            match apply_control(job.status, action) {
                Some(next) => {
                    job.status = next;
                    job.updated_at = Utc::now();
                    (Some(before), job.clone())
                }
                None => (None, before),
            }
        })?;

        let Some((before, job)) = outcome else {
            warn!(job_id, action = %action, "Control action for unknown job");
            return Ok(None);
        };
        let Some(before) = before else {
            info!(
                job_id,
                action = %action,
                status = %job.status,
                "Control action does not apply, ignoring"
            );
            return Ok(Some(job));
        };

        self.sync_worker(job_id);
        drop(control);

        info!(job_id, action = %action, status = %job.status, "Job control applied");
        self.ctx.audit.log_change(
            &format!("job.{}", action),
            job_id,
            &self.ctx.config.actor,
            Some(&before),
            Some(&job),
        );
        self.ctx.events.send(MiningEventKind::JobUpdated {
            job_id: job.id.clone(),
            status: job.status,
        });
        Ok(Some(job))
    }

    /// Flags every mined lead with this CNPJ as promoted to the CRM.
    /// Returns how many leads changed; repeating the call returns 0.
    pub fn mark_imported(&self, cnpj: &str) -> Result<usize> {
        let key = normalize_cnpj(cnpj);
        let count = self.ctx.registry.mark_imported(&key)?;
        if count == 0 {
            return Ok(0);
        }

        info!(cnpj = %key, count, "Leads marked as imported");
        self.ctx.audit.log_action(
            "lead.import",
            &key,
            &self.ctx.config.actor,
            Some(serde_json::json!({ "isImported": false })),
            Some(serde_json::json!({ "isImported": true, "count": count })),
        );
        self.ctx
            .events
            .send(MiningEventKind::LeadImported { cnpj: key, count });
        Ok(count)
    }

    /// Starts a worker for every persisted Running job that has none.
    /// Returns the ids of the workers started.
    pub fn hydrate(&self) -> Vec<String> {
        let _control = self.control_guard();
        let started: Vec<String> = self
            .ctx
            .registry
            .running_ids()
            .into_iter()
            .filter(|id| self.ctx.scheduler.start(&self.ctx, id))
            .collect();
        info!(
            environment = %self.environment(),
            count = started.len(),
            "Hydrated running jobs"
        );
        started
    }

    /// Moves the engine to another partition. Workers of the current one
    /// are stopped and the new partition's running jobs are hydrated.
    pub fn switch_environment(&self, environment: Environment) -> Vec<String> {
        self.ctx.scheduler.stop_all();
        let previous = self.ctx.store.environment().set(environment);
        info!(from = %previous, to = %environment, "Environment switched");

        self.ctx.audit.log_change(
            "environment.switch",
            environment.as_str(),
            &self.ctx.config.actor,
            Some(&previous),
            Some(&environment),
        );
        self.ctx
            .events
            .send(MiningEventKind::EnvironmentChanged { environment });

        self.hydrate()
    }

    /// Runs one polling cycle for the job right away.
    pub async fn tick(&self, job_id: &str) -> TickOutcome {
        let stop = self
            .ctx
            .scheduler
            .stop_signal(job_id)
            .unwrap_or_else(|| watch::channel(false).1);

        let outcome = worker::run_tick(&self.ctx, job_id, &stop).await;
        if outcome == TickOutcome::Stop {
            let _control = self.control_guard();
            let running = self
                .ctx
                .registry
                .get(job_id)
                .is_some_and(|job| job.status == JobStatus::Running);
            if !running {
                self.sync_worker(job_id);
            }
        }
        outcome
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MiningEvent> {
        self.ctx.events.subscribe()
    }

    pub fn active_workers(&self) -> Vec<String> {
        self.ctx.scheduler.active_job_ids()
    }

    pub fn shutdown(&self) {
        let stopped = self.ctx.scheduler.stop_all();
        info!(stopped, "Mining engine shut down");
    }
}

impl Drop for MiningEngine {
    fn drop(&mut self) {
        self.ctx.scheduler.stop_all();
    }
}
