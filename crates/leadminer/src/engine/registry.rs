//! Persisted job records and the lead views derived from them.

use crate::environment::keys;
use crate::error::StoreError;
use crate::model::{normalize_cnpj, JobStatus, MiningJob, MiningLead};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct JobRegistry {
    store: Store,
}

impl JobRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn insert(&self, job: &MiningJob) -> Result<(), StoreError> {
        self.store.transaction(|txn| {
            let mut jobs: Vec<MiningJob> = txn.load(keys::JOBS)?;
            jobs.push(job.clone());
            txn.save(keys::JOBS, &jobs)
        })
    }

    /// All jobs, newest-created first.
    pub fn list(&self) -> Vec<MiningJob> {
        let mut jobs: Vec<MiningJob> = self.store.load(keys::JOBS);
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn get(&self, id: &str) -> Option<MiningJob> {
        self.store
            .load::<MiningJob>(keys::JOBS)
            .into_iter()
            .find(|job| job.id == id)
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.store
            .load::<MiningJob>(keys::JOBS)
            .into_iter()
            .filter(|job| job.status == JobStatus::Running)
            .map(|job| job.id)
            .collect()
    }

    /// Applies `f` to the job atomically. The collection is only written
    /// when `f` changed the record. Returns `None` for an unknown id.
    pub fn update<F, R>(&self, id: &str, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&mut MiningJob) -> R,
    {
        self.store.transaction(|txn| {
            let mut jobs: Vec<MiningJob> = txn.load(keys::JOBS)?;
            let Some(job) = jobs.iter_mut().find(|job| job.id == id) else {
                return Ok(None);
            };

            let before = job.clone();
            let result = f(job);
            if *job != before {
                txn.save(keys::JOBS, &jobs)?;
            }
            Ok(Some(result))
        })
    }

    /// Unimported leads discovered by one job.
    pub fn leads_for_job(&self, job_id: &str) -> Vec<MiningLead> {
        self.store
            .load::<MiningLead>(keys::LEADS)
            .into_iter()
            .filter(|lead| lead.job_id == job_id && !lead.is_imported)
            .collect()
    }

    /// Unimported leads across every job.
    pub fn unimported_leads(&self) -> Vec<MiningLead> {
        self.store
            .load::<MiningLead>(keys::LEADS)
            .into_iter()
            .filter(|lead| !lead.is_imported)
            .collect()
    }

    /// Flags every lead with this natural key as imported. Returns how many
    /// leads changed.
    pub fn mark_imported(&self, cnpj: &str) -> Result<usize, StoreError> {
        let key = normalize_cnpj(cnpj);
        if key.is_empty() {
            return Ok(0);
        }

        self.store.transaction(|txn| {
            let mut leads: Vec<MiningLead> = txn.load(keys::LEADS)?;
            let mut flipped = 0;
            for lead in leads.iter_mut() {
                if lead.cnpj == key && !lead.is_imported {
                    lead.is_imported = true;
                    flipped += 1;
                }
            }
            if flipped > 0 {
                txn.save(keys::LEADS, &leads)?;
            }
            Ok(flipped)
        })
    }
}
