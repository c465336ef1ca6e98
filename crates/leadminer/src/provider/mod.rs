//! Company-discovery provider contract.
//!
//! The engine never talks to the network itself. It calls a
//! [`DiscoveryProvider`] once per tick with the job's filters and the next
//! page cursor. Empty batches and failures are normal operating conditions.

pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::{CompanySize, DebtFilter, MiningJob};

pub use scripted::ScriptedProvider;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    pub segment: String,
    pub city: String,
    pub state: String,
    /// `None` when every size bucket is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<CompanySize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_regime: Option<String>,
    #[serde(default)]
    pub debt_filter: DebtFilter,
    #[serde(default)]
    pub enrich: bool,
    /// 1-based page cursor.
    pub page: u32,
}

impl DiscoveryRequest {
    /// Builds the request for the job's next page.
    pub fn for_job(job: &MiningJob) -> Self {
        let filters = &job.filters;
        Self {
            segment: filters.segment.clone(),
            city: filters.city.clone(),
            state: filters.state.clone(),
            size: match filters.size {
                CompanySize::All => None,
                size => Some(size),
            },
            tax_regime: filters.tax_regime.clone(),
            debt_filter: filters.debt_filter,
            enrich: job.enrich,
            page: job.next_page(),
        }
    }
}

/// A company returned by the provider. Only the natural key and name are
/// expected; everything else may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCompany {
    #[serde(default)]
    pub cnpj: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(default)]
    pub decision_maker_name: Option<String>,
    #[serde(default)]
    pub decision_maker_phone: Option<String>,
    #[serde(default)]
    pub decision_maker_email: Option<String>,
    /// Expected in `1..=5`; clamped on ingestion.
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub debt_status: Option<String>,
    #[serde(default)]
    pub estimated_revenue: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvenanceSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub companies: Vec<CandidateCompany>,
    #[serde(default)]
    pub sources: Vec<ProvenanceSource>,
}

impl DiscoveryResponse {
    pub fn new(companies: Vec<CandidateCompany>, sources: Vec<ProvenanceSource>) -> Self {
        Self { companies, sources }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

/// External company-discovery capability.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    async fn discover(&self, request: &DiscoveryRequest)
        -> Result<DiscoveryResponse, ProviderError>;
}
