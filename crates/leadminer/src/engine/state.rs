//! Legal status transitions of a mining job.
//!
//! ```text
//! Running --pause--> Paused --resume--> Running
//! Running|Paused --cancel--> Cancelled
//! Running --target reached | search exhausted--> Completed
//! Running --too many errors--> Failed
//! ```

use serde::{Deserialize, Serialize};

use crate::model::JobStatus;

/// Caller-issued control command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status after applying `action`, or `None` when the action does not apply.
pub fn apply_control(status: JobStatus, action: ControlAction) -> Option<JobStatus> {
    match (status, action) {
        (JobStatus::Running, ControlAction::Pause) => Some(JobStatus::Paused),
        (JobStatus::Paused, ControlAction::Resume) => Some(JobStatus::Running),
        (JobStatus::Running | JobStatus::Paused, ControlAction::Cancel) => {
            Some(JobStatus::Cancelled)
        }
        _ => None,
    }
}
