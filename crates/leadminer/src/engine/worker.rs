//! One polling cycle of a mining job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::pipeline;
use super::EngineContext;
use crate::broadcast::MiningEventKind;
use crate::environment::keys;
use crate::error::{ProviderError, StoreError};
use crate::model::{JobStatus, MiningJob};
use crate::provider::{DiscoveryRequest, DiscoveryResponse};

/// Whether the worker should keep polling after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Per-job async locks keeping ticks of the same job from overlapping.
#[derive(Debug, Default)]
pub(crate) struct TickLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TickLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn get(&self, job_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.table().entry(job_id.to_string()).or_default())
    }

    /// Forgets the lock of `job_id` unless a tick holds or awaits it.
    pub(crate) fn release(&self, job_id: &str) -> bool {
        let mut locks = self.table();
        if locks
            .get(job_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(job_id);
            return true;
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }
}

/// Result of committing a provider answer.
enum Commit {
    Applied {
        job: MiningJob,
        added: usize,
        milestone: Option<u8>,
    },
    /// The job left Running, the worker was stopped, or another tick already
    /// consumed this page.
    Discarded(Option<JobStatus>),
}

pub(crate) async fn run_tick(
    ctx: &EngineContext,
    job_id: &str,
    stop: &watch::Receiver<bool>,
) -> TickOutcome {
    let lock = ctx.tick_locks.get(job_id);
    let _guard = lock.lock().await;

    tick(ctx, job_id, stop)
        .instrument(info_span!("mining.tick", job_id = %job_id))
        .await
}

async fn tick(ctx: &EngineContext, job_id: &str, stop: &watch::Receiver<bool>) -> TickOutcome {
    let Some(job) = ctx.registry.get(job_id) else {
        debug!("Job no longer exists, stopping worker");
        return TickOutcome::Stop;
    };
    if job.status != JobStatus::Running {
        debug!(status = %job.status, "Job is not running, stopping worker");
        return TickOutcome::Stop;
    }

    if job.target_reached() {
        return finalize_reached(ctx, job_id, stop);
    }

    let request = DiscoveryRequest::for_job(&job);
    let page = request.page;
    debug!(page, "Requesting page");
    let result = ctx.provider.discover(&request).await;

    match commit(ctx, job_id, page, stop, result) {
        Ok(Commit::Applied {
            job,
            added,
            milestone,
        }) => {
            announce(ctx, &job, added, milestone);
            if job.status == JobStatus::Running {
                TickOutcome::Continue
            } else {
                TickOutcome::Stop
            }
        }
        Ok(Commit::Discarded(status)) => {
            debug!(page, "Discarding result for job that changed during the call");
            match status {
                Some(JobStatus::Running) if !*stop.borrow() => TickOutcome::Continue,
                _ => TickOutcome::Stop,
            }
        }
        Err(e) => {
            error!(page, "Failed to commit tick: {}", e);
            TickOutcome::Continue
        }
    }
}

fn is_live(job: &MiningJob, stop: &watch::Receiver<bool>) -> bool {
    job.status == JobStatus::Running && !*stop.borrow()
}

/// Completes a job whose target was already met before polling.
fn finalize_reached(ctx: &EngineContext, job_id: &str, stop: &watch::Receiver<bool>) -> TickOutcome {
    let result = ctx.store.transaction(|txn| {
        let mut jobs: Vec<MiningJob> = txn.load(keys::JOBS)?;
        let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) else {
            return Ok(None);
        };
        if !is_live(job, stop) || !job.target_reached() {
            return Ok(None);
        }
        job.status = JobStatus::Completed;
        job.updated_at = Utc::now();
        let milestone = job.advance_milestone();
        let updated = job.clone();
        txn.save(keys::JOBS, &jobs)?;
        Ok(Some((updated, milestone)))
    });

    match result {
        Ok(Some((job, milestone))) => announce(ctx, &job, 0, milestone),
        Ok(None) => {}
        Err(e) => error!("Failed to finalize job: {}", e),
    }
    TickOutcome::Stop
}

fn commit(
    ctx: &EngineContext,
    job_id: &str,
    page: u32,
    stop: &watch::Receiver<bool>,
    result: Result<DiscoveryResponse, ProviderError>,
) -> Result<Commit, StoreError> {
    let config = &ctx.config;
    ctx.store.transaction(|txn| {
        let mut jobs: Vec<MiningJob> = txn.load(keys::JOBS)?;
        let Some(index) = jobs.iter().position(|job| job.id == job_id) else {
            return Ok(Commit::Discarded(None));
        };
        if !is_live(&jobs[index], stop) || jobs[index].next_page() != page {
            return Ok(Commit::Discarded(Some(jobs[index].status)));
        }

        let mut added = 0;
        let mut milestone = None;
        match result {
            Err(e) => {
                let job = &mut jobs[index];
                job.errors += 1;
                job.last_error = Some(e.to_string());
                warn!(page, errors = job.errors, "Provider call failed: {}", e);
                if job.errors > config.max_errors {
                    job.status = JobStatus::Failed;
                }
            }
            Ok(response) if response.is_empty() => {
                let job = &mut jobs[index];
                job.pages_fetched += 1;
                job.consecutive_empty_pages += 1;
                if job.found_count == 0 && job.pages_fetched > config.empty_page_limit {
                    job.status = JobStatus::Completed;
                }
            }
            Ok(response) => {
                let limit = jobs[index].remaining() as usize;
                added = pipeline::merge(
                    txn,
                    &jobs[index],
                    &response.companies,
                    &response.sources,
                    Some(limit),
                )?;

                let job = &mut jobs[index];
                job.found_count += added as u32;
                job.pages_fetched += 1;
                job.consecutive_empty_pages = 0;
                if job.target_reached() {
                    job.status = JobStatus::Completed;
                }
                milestone = job.advance_milestone();
            }
        }

        let job = &mut jobs[index];
        job.updated_at = Utc::now();
        let updated = job.clone();
        txn.save(keys::JOBS, &jobs)?;
        Ok(Commit::Applied {
            job: updated,
            added,
            milestone,
        })
    })
}

fn announce(ctx: &EngineContext, job: &MiningJob, added: usize, milestone: Option<u8>) {
    if added > 0 {
        debug!(added, found = job.found_count, "New leads persisted");
        ctx.events.send(MiningEventKind::LeadsAdded {
            job_id: job.id.clone(),
            count: added,
        });
    }
    if let Some(percent) = milestone {
        info!(percent, "Job reached milestone");
        ctx.events.send(MiningEventKind::MilestoneReached {
            job_id: job.id.clone(),
            percent,
        });
    }

    match job.status {
        JobStatus::Completed => {
            info!(
                found = job.found_count,
                pages = job.pages_fetched,
                "Job completed"
            );
            ctx.audit
                .log_change::<MiningJob>("job.complete", &job.id, &ctx.config.actor, None, Some(job));
        }
        JobStatus::Failed => {
            warn!(errors = job.errors, "Job failed after too many errors");
            ctx.audit
                .log_change::<MiningJob>("job.fail", &job.id, &ctx.config.actor, None, Some(job));
        }
        _ => {}
    }

    ctx.events.send(MiningEventKind::JobUpdated {
        job_id: job.id.clone(),
        status: job.status,
    });
}
