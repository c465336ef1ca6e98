//! Change notifications for observers of the mining engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::environment::Environment;
use crate::model::JobStatus;

/// What changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MiningEventKind {
    /// A job record was written.
    JobUpdated { job_id: String, status: JobStatus },
    /// A page produced new leads.
    LeadsAdded { job_id: String, count: usize },
    /// Progress crossed a 25% step.
    MilestoneReached { job_id: String, percent: u8 },
    /// Leads with this natural key were promoted into the CRM.
    LeadImported { cnpj: String, count: usize },
    EnvironmentChanged { environment: Environment },
    SnapshotRestored { snapshot_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningEvent {
    #[serde(flatten)]
    pub kind: MiningEventKind,
    pub timestamp: DateTime<Utc>,
}

impl MiningEvent {
    pub fn new(kind: MiningEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// The job this event concerns, if any.
    pub fn job_id(&self) -> Option<&str> {
        match &self.kind {
            MiningEventKind::JobUpdated { job_id, .. }
            | MiningEventKind::LeadsAdded { job_id, .. }
            | MiningEventKind::MilestoneReached { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// Fire-and-forget broadcaster of [`MiningEvent`]s.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    sender: Arc<broadcast::Sender<MiningEvent>>,
}

impl std::fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBroadcaster")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl ChangeBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity,
    /// raised to 1 when zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, kind: MiningEventKind) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(MiningEvent::new(kind));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MiningEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
