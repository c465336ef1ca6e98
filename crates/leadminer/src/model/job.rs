//! Mining job record and its filter set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle status of a mining job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Completed, Cancelled and Failed accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Company-size bucket requested from the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Micro,
    Small,
    Medium,
    Large,
    #[default]
    All,
}

/// Fiscal/debt filter applied to discovered companies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebtFilter {
    #[default]
    Any,
    WithoutDebt,
    WithDebt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    pub segment: String,
    pub state: String,
    /// Empty means the whole state.
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub size: CompanySize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_regime: Option<String>,
    #[serde(default)]
    pub debt_filter: DebtFilter,
}

/// Parameters for creating a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    /// Display name. Derived from the filters when blank.
    #[serde(default)]
    pub name: String,
    pub filters: JobFilters,
    pub target_count: u32,
    #[serde(default)]
    pub auto_create_segment: bool,
    #[serde(default)]
    pub enrich: bool,
}

impl NewJob {
    pub fn new(filters: JobFilters, target_count: u32) -> Self {
        Self {
            name: String::new(),
            filters,
            target_count,
            auto_create_segment: false,
            enrich: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.filters.segment.trim().is_empty() {
            return Err(ValidationError::MissingField("segment"));
        }
        if self.filters.state.trim().is_empty() {
            return Err(ValidationError::MissingField("state"));
        }
        if self.target_count == 0 {
            return Err(ValidationError::ZeroTargetCount);
        }
        Ok(())
    }
}

/// One discovery campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MiningJob {
    pub id: String,
    pub name: String,
    pub status: JobStatus,
    pub filters: JobFilters,
    pub target_count: u32,
    #[serde(default)]
    pub found_count: u32,
    #[serde(default)]
    pub pages_fetched: u32,
    #[serde(default)]
    pub errors: u32,
    #[serde(default)]
    pub consecutive_empty_pages: u32,
    #[serde(default)]
    pub auto_create_segment: bool,
    #[serde(default)]
    pub enrich: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Highest progress milestone (percent) already announced.
    #[serde(default)]
    pub last_milestone: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MiningJob {
    /// Builds a Running job with zeroed counters.
    pub fn from_request(request: NewJob) -> Result<Self, ValidationError> {
        request.validate()?;

        let mut filters = request.filters;
        filters.segment = filters.segment.trim().to_string();
        filters.state = filters.state.trim().to_string();
        filters.city = filters.city.trim().to_string();

        let name = if request.name.trim().is_empty() {
            default_name(&filters)
        } else {
            request.name.trim().to_string()
        };

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            status: JobStatus::Running,
            filters,
            target_count: request.target_count,
            found_count: 0,
            pages_fetched: 0,
            errors: 0,
            consecutive_empty_pages: 0,
            auto_create_segment: request.auto_create_segment,
            enrich: request.enrich,
            created_at: now,
            updated_at: now,
            last_milestone: 0,
            last_error: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn target_reached(&self) -> bool {
        self.found_count >= self.target_count
    }

    /// Page cursor for the next provider call.
    pub fn next_page(&self) -> u32 {
        self.pages_fetched + 1
    }

    /// Number of leads still needed to reach the target.
    pub fn remaining(&self) -> u32 {
        self.target_count.saturating_sub(self.found_count)
    }

    pub fn progress_percent(&self) -> u8 {
        if self.target_count == 0 {
            return 100;
        }
        let percent = u64::from(self.found_count) * 100 / u64::from(self.target_count);
        percent.min(100) as u8
    }

    /// Records the highest 25% milestone reached. Returns it when it is new.
    pub fn advance_milestone(&mut self) -> Option<u8> {
        let milestone = self.progress_percent() / 25 * 25;
        if milestone > self.last_milestone {
            self.last_milestone = milestone;
            Some(milestone)
        } else {
            None
        }
    }
}

fn default_name(filters: &JobFilters) -> String {
    if filters.city.is_empty() {
        format!("{} - {}", filters.segment, filters.state)
    } else {
        format!("{} - {}/{}", filters.segment, filters.city, filters.state)
    }
}
