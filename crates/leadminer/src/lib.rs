pub mod audit;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod engine;
pub mod environment;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod store;

pub use audit::{AuditEntry, AuditLog, Snapshot, SnapshotManager};
pub use broadcast::{ChangeBroadcaster, MiningEvent, MiningEventKind};
pub use config::{load_config, EngineConfig};
pub use engine::{ControlAction, MiningEngine, TickOutcome};
pub use environment::{Environment, EnvironmentHandle};
pub use error::{
    ConfigError, LeadMinerError, ProviderError, Result, StoreError, ValidationError,
};
pub use model::{JobFilters, JobStatus, MiningJob, MiningLead, NewJob};
pub use provider::{DiscoveryProvider, ScriptedProvider};
pub use store::Store;
