//! Test harness for driving the mining engine.
//!
//! The harness owns an engine built over an in-memory or temp-file
//! database and a [`ScriptedProvider`] the test fills with pages. By default
//! the poll interval is an hour, so workers exist but never fire on their
//! own and tests advance jobs with explicit ticks.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use leadminer::db::Database;
use leadminer::environment::keys;
use leadminer::{
    EngineConfig, EnvironmentHandle, MiningEngine, MiningJob, NewJob, ScriptedProvider, Store,
    TickOutcome,
};

use super::builders::JobBuilder;

pub struct TestHarness {
    pub engine: MiningEngine,
    pub provider: Arc<ScriptedProvider>,
    pub store: Store,
    /// Keeps a file-backed database alive.
    temp_dir: Option<TempDir>,
}

/// Config for manually ticked tests.
pub fn manual_config() -> EngineConfig {
    EngineConfig {
        poll_interval_secs: 3600,
        ..Default::default()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(manual_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Store::in_memory().expect("Failed to open in-memory store");
        Self::build(config, store, Arc::new(ScriptedProvider::new()), None)
    }

    pub fn with_provider(config: EngineConfig, provider: ScriptedProvider) -> Self {
        let store = Store::in_memory().expect("Failed to open in-memory store");
        Self::build(config, store, Arc::new(provider), None)
    }

    /// Harness over a database file in a fresh temp directory.
    pub fn file_backed() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = open_store(&temp_dir.path().join("leadminer.db"));
        Self::build(
            manual_config(),
            store,
            Arc::new(ScriptedProvider::new()),
            Some(temp_dir),
        )
    }

    fn build(
        config: EngineConfig,
        store: Store,
        provider: Arc<ScriptedProvider>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let engine = MiningEngine::new(config, store.clone(), provider.clone());
        Self {
            engine,
            provider,
            store,
            temp_dir,
        }
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|dir| dir.path().join("leadminer.db"))
    }

    /// Simulates a process restart: drops the engine and opens a new one
    /// over the same database file with a fresh provider.
    pub fn restart(self) -> Self {
        let Self {
            engine, temp_dir, ..
        } = self;
        let config = engine.config().clone();
        drop(engine);

        let temp_dir = temp_dir.expect("restart requires a file-backed harness");
        let store = open_store(&temp_dir.path().join("leadminer.db"));
        Self::build(
            config,
            store,
            Arc::new(ScriptedProvider::new()),
            Some(temp_dir),
        )
    }

    pub fn create_job(&self, target: u32) -> MiningJob {
        self.create(JobBuilder::new().target(target).build())
    }

    pub fn create(&self, request: NewJob) -> MiningJob {
        self.engine
            .create_job(request)
            .expect("Failed to create job")
    }

    pub fn job(&self, id: &str) -> MiningJob {
        self.engine.get_job(id).expect("Job not found")
    }

    pub async fn tick(&self, id: &str) -> TickOutcome {
        self.engine.tick(id).await
    }

    /// Ticks `n` times, returning the last outcome.
    pub async fn tick_n(&self, id: &str, n: usize) -> TickOutcome {
        let mut outcome = TickOutcome::Continue;
        for _ in 0..n {
            outcome = self.engine.tick(id).await;
        }
        outcome
    }

    /// Writes CRM leads with the given CNPJs into the active partition.
    pub fn seed_crm(&self, cnpjs: &[&str]) {
        let leads: Vec<serde_json::Value> = cnpjs
            .iter()
            .map(|cnpj| json!({ "cnpj": cnpj, "name": format!("CRM {}", cnpj) }))
            .collect();
        self.store
            .save(keys::CRM_LEADS, &leads)
            .expect("Failed to seed CRM leads");
    }

    pub fn stored_lead_keys(&self) -> Vec<String> {
        self.store
            .load::<leadminer::MiningLead>(keys::LEADS)
            .into_iter()
            .map(|lead| lead.cnpj)
            .collect()
    }
}

fn open_store(path: &Path) -> Store {
    let db = Database::open(path).expect("Failed to open database");
    Store::new(db, EnvironmentHandle::default())
}
